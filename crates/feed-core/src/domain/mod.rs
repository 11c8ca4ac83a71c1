//! 수집 파이프라인의 순수 도메인 로직.

pub mod catalog;
pub mod normalize;
pub mod segment;

pub use catalog::*;
pub use normalize::*;
pub use segment::*;
