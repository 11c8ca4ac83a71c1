//! 공급자 원시 샘플과 정규화된 관측값.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Instrument;

/// 공급자가 반환한 원시 샘플 한 행.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Quote {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// 정규화가 끝난 관측값.
///
/// 생성 후 변경되지 않으며 싱크 기록 시 한 번씩 소비됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub instrument: Instrument,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// 주가지수에만 존재
    pub volume: Option<i64>,
}

impl Observation {
    pub fn new(instrument: Instrument, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            instrument,
            timestamp,
            value,
            volume: None,
        }
    }

    /// 거래량을 설정합니다. `i64` 범위를 넘으면 포화시킵니다.
    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(i64::try_from(volume).unwrap_or(i64::MAX));
        self
    }
}

/// 관측값 하나를 싱크 하나에 기록한 결과.
///
/// 로그/통계 용도로만 사용되며 저장되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// 새로 기록됨
    Written,
    /// 이미 존재하여 건너뜀
    DuplicateSkipped,
    /// 재시도 후에도 실패
    Failed,
}

impl WriteOutcome {
    /// 싱크가 관측값을 보유하게 되었는지 여부.
    pub fn is_success(&self) -> bool {
        !matches!(self, WriteOutcome::Failed)
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Written => write!(f, "written"),
            WriteOutcome::DuplicateSkipped => write!(f, "duplicate_skipped"),
            WriteOutcome::Failed => write!(f, "failed"),
        }
    }
}
