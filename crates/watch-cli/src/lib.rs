//! 관심종목 서비스 CLI 도구.
//!
//! 서버 없이 시세 조회, 파생 지표 계산, 확장 데이터 캐시 관리를 수행합니다.
//! 각 명령은 출력 문자열을 반환하며 `main`이 stdout으로 출력합니다.

pub mod commands;
pub mod context;
pub mod output;

pub use context::CliContext;
pub use output::OutputFormat;
