//! # Watch Core
//!
//! 주식 관심종목 서비스의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목 심볼, 시세, 가격 시계열
//! - 캐시 데이터 카테고리와 기본 TTL
//! - 가격 알림 규칙
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
