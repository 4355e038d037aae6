//! Yahoo HTTP 클라이언트 응답 파싱 및 오류 처리 테스트.

use mockito::{Matcher, Server, ServerGuard};
use rust_decimal_macros::dec;
use watch_core::StockSymbol;
use watch_data::{DataError, YahooHttpClient};

fn aapl() -> StockSymbol {
    StockSymbol::parse("AAPL").unwrap()
}

async fn server_with_crumb() -> ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/test/getcrumb")
        .with_status(200)
        .with_body("test-crumb")
        .create_async()
        .await;
    server
}

#[tokio::test]
async fn test_calendar_parses_earnings_and_dividend_dates() {
    let mut server = server_with_crumb().await;
    server
        .mock("GET", "/v10/finance/quoteSummary/AAPL")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("modules".into(), "calendarEvents".into()),
            Matcher::UrlEncoded("crumb".into(), "test-crumb".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"quoteSummary":{"result":[{"calendarEvents":{
                "earnings":{
                    "earningsDate":[{"raw":1761854400},{"raw":1761768000}],
                    "earningsAverage":{"raw":1.7712},
                    "revenueAverage":{"raw":101000000000}
                },
                "exDividendDate":{"raw":1757289600},
                "dividendDate":{"raw":1757548800}
            }}],"error":null}}"#,
        )
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let calendar = client.calendar(&aapl()).await.unwrap();

    assert_eq!(calendar.earnings_dates.len(), 2);
    assert!(calendar.earnings_dates[0] < calendar.earnings_dates[1]);
    assert_eq!(calendar.earnings_average, Some(dec!(1.7712)));
    assert_eq!(calendar.revenue_average, Some(dec!(101000000000)));
    assert!(calendar.ex_dividend_date.is_some());
    assert!(calendar.earnings_low.is_none());
}

#[tokio::test]
async fn test_analyst_sorts_rating_changes_newest_first() {
    let mut server = server_with_crumb().await;
    server
        .mock("GET", "/v10/finance/quoteSummary/AAPL")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"quoteSummary":{"result":[{
                "recommendationTrend":{"trend":[
                    {"period":"0m","strongBuy":5,"buy":20,"hold":10,"sell":1,"strongSell":0}
                ]},
                "financialData":{
                    "targetMeanPrice":{"raw":245.5},
                    "targetHighPrice":{"raw":300.0},
                    "recommendationKey":"buy",
                    "numberOfAnalystOpinions":{"raw":36}
                },
                "upgradeDowngradeHistory":{"history":[
                    {"epochGradeDate":1700000000,"firm":"A","toGrade":"Buy","fromGrade":"","action":"main"},
                    {"epochGradeDate":1710000000,"firm":"B","toGrade":"Hold","fromGrade":"Buy","action":"down"}
                ]}
            }],"error":null}}"#,
        )
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let analyst = client.analyst(&aapl()).await.unwrap();

    assert_eq!(analyst.recommendation_trend.len(), 1);
    assert_eq!(analyst.recommendation_trend[0].total(), 36);
    assert_eq!(analyst.target_mean, Some(dec!(245.5)));
    assert_eq!(analyst.recommendation_key.as_deref(), Some("buy"));
    assert_eq!(analyst.analyst_count, Some(36));
    assert_eq!(analyst.upgrades_downgrades[0].firm, "B");
    assert!(analyst.upgrades_downgrades[1].from_grade.is_none());
}

#[tokio::test]
async fn test_holders_converts_ratios_to_percent() {
    let mut server = server_with_crumb().await;
    server
        .mock("GET", "/v10/finance/quoteSummary/AAPL")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"quoteSummary":{"result":[{
                "majorHoldersBreakdown":{
                    "insidersPercentHeld":{"raw":0.0171},
                    "institutionsPercentHeld":{"raw":0.6245},
                    "institutionsCount":{"raw":6523}
                },
                "institutionOwnership":{"ownershipList":[
                    {"organization":"Vanguard","pctHeld":{"raw":0.0912},"position":{"raw":1400000000},"reportDate":{"raw":1719705600}}
                ]}
            }],"error":null}}"#,
        )
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let holders = client.holders(&aapl()).await.unwrap();

    assert_eq!(holders.insiders_pct, Some(dec!(1.71)));
    assert_eq!(holders.institutions_pct, Some(dec!(62.45)));
    assert_eq!(holders.institutions_count, Some(6523));
    assert_eq!(holders.top_institutions[0].organization, "Vanguard");
    assert_eq!(holders.top_institutions[0].pct_held, Some(dec!(9.12)));
}

#[tokio::test]
async fn test_crumb_fetched_once_and_reused() {
    let mut server = Server::new_async().await;
    let crumb = server
        .mock("GET", "/v1/test/getcrumb")
        .with_status(200)
        .with_body("abc")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/v10/finance/quoteSummary/AAPL")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"quoteSummary":{"result":[{"assetProfile":{"sector":"Technology","industry":"Consumer Electronics"}}],"error":null}}"#)
        .expect(2)
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let (sector, _) = client.asset_profile(&aapl()).await.unwrap();
    client.asset_profile(&aapl()).await.unwrap();

    assert_eq!(sector.as_deref(), Some("Technology"));
    crumb.assert_async().await;
}

#[tokio::test]
async fn test_html_crumb_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/test/getcrumb")
        .with_status(200)
        .with_body("<html>consent</html>")
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let err = client.calendar(&aapl()).await.unwrap_err();
    assert!(matches!(err, DataError::ParseError(_)));
}

#[tokio::test]
async fn test_search_maps_quotes() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/finance/search")
        .match_query(Matcher::UrlEncoded("q".into(), "apple".into()))
        .with_status(200)
        .with_body(
            r#"{"quotes":[
                {"symbol":"AAPL","shortname":"Apple Inc.","longname":"Apple Inc.","exchDisp":"NASDAQ","quoteType":"EQUITY"},
                {"shortname":"no symbol"},
                {"symbol":"APLE","shortname":"Apple Hospitality","exchange":"NYQ","quoteType":"EQUITY"}
            ]}"#,
        )
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let matches = client.search("apple", 10).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].symbol, "AAPL");
    assert_eq!(matches[0].exchange.as_deref(), Some("NASDAQ"));
    assert_eq!(matches[1].exchange.as_deref(), Some("NYQ"));
}

#[tokio::test]
async fn test_chart_events_sorted_newest_first() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v8/finance/chart/AAPL")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"chart":{"result":[{"events":{
                "dividends":{
                    "1707489000":{"amount":0.24,"date":1707489000},
                    "1715348400":{"amount":0.25,"date":1715348400}
                },
                "splits":{
                    "1598880600":{"date":1598880600,"numerator":4,"denominator":1,"splitRatio":"4:1"}
                }
            }}],"error":null}}"#,
        )
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 0).unwrap();
    let data = client.dividends_splits(&aapl()).await.unwrap();

    assert_eq!(data.dividends.len(), 2);
    assert_eq!(data.dividends[0].amount, dec!(0.25));
    assert_eq!(data.splits[0].ratio, "4:1");
    assert_eq!(data.splits[0].numerator, dec!(4));
}

#[tokio::test]
async fn test_rate_limit_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/finance/search")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 3).unwrap();
    let err = client.search("apple", 5).await.unwrap_err();

    assert!(matches!(err, DataError::RateLimited(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_retried_then_fails() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v8/finance/chart/AAPL")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 1).unwrap();
    let err = client.dividends_splits(&aapl()).await.unwrap_err();

    assert!(matches!(err, DataError::FetchError(_)));
    assert!(err.is_transient());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_maps_to_no_data() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v8/finance/chart/AAPL")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let client = YahooHttpClient::with_base_url(server.url(), 2).unwrap();
    let err = client.dividends_splits(&aapl()).await.unwrap_err();
    assert!(matches!(err, DataError::NoData(_)));
}
