//! 파이프라인 전반에서 사용되는 공통 타입.

mod granularity;
mod instrument;
mod observation;

pub use granularity::*;
pub use instrument::*;
pub use observation::*;
