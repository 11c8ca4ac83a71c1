//! # Feed Core
//!
//! 시장 데이터 수집 파이프라인의 핵심 도메인 모델을 제공합니다.
//!
//! - 수집 대상 상품(환율, 주가지수, 달러 인덱스)과 공급자 심볼 카탈로그
//! - 과거 구간을 데이터 밀도에 맞춰 분할하는 구간 계획기
//! - 부동소수점 잡음을 제거하는 값 정규화기
//! - 로깅 인프라
//!
//! 이 크레이트는 I/O를 수행하지 않습니다.

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
