//! Repository pattern for database operations.
//!
//! 데이터베이스 접근 로직을 라우트 핸들러에서 분리합니다.
//! 모든 Repository는 `&PgPool`을 받는 static method 패턴을 사용합니다.

pub mod alert;
pub mod stock;
pub mod watchlist;

pub use alert::{AlertEventRecord, AlertFilter, AlertRepository, NewAlert, UpdateAlert};
pub use stock::{NewStock, StockRecord, StockRepository};
pub use watchlist::{
    NewWatchlist, NewWatchlistStock, UpdateWatchlist, WatchlistRecord, WatchlistRepository,
    WatchlistStockRecord, WatchlistWithCount,
};

/// DB 마이그레이션 실행.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
