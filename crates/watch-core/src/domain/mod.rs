//! 관심종목 서비스의 도메인 모델.

mod alert;
mod category;
mod market_data;
mod symbol;

pub use alert::*;
pub use category::*;
pub use market_data::*;
pub use symbol::*;
