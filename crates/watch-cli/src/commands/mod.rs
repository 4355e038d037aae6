//! CLI 명령어 구현 모듈.

pub mod cache;
pub mod fetch;
pub mod metrics;
pub mod quote;
