//! 도메인 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// 시작 시각이 종료 시각보다 늦거나 같은 구간
    #[error("잘못된 구간: {start} >= {end}")]
    InvalidSegment { start: String, end: String },

    /// 알 수 없는 샘플링 단위
    #[error("알 수 없는 샘플링 단위: {0}")]
    UnknownGranularity(String),

    /// 숫자로 변환할 수 없는 값
    #[error("숫자 변환 실패: {0}")]
    NonNumeric(String),

    /// 파생 값 계산 실패
    #[error("파생 값 계산 실패: {0}")]
    Derivation(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
