//! 샘플링 단위와 공급자 조회 요청 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 공급자에 요청하는 샘플링 단위.
///
/// 과거로 갈수록 세밀한 데이터를 구할 수 없으므로 구간마다 단위가 다릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// 일봉
    Daily,
    /// 시간봉
    Hourly,
    /// 분봉
    SubHourly,
}

impl Granularity {
    /// Yahoo Finance interval 문자열로 변환합니다.
    pub fn to_yahoo_interval(&self) -> &'static str {
        match self {
            Granularity::Daily => "1d",
            Granularity::Hourly => "1h",
            Granularity::SubHourly => "1m",
        }
    }

    /// Yahoo Finance interval 문자열에서 파싱합니다.
    ///
    /// `15m` 등 분 단위 interval은 모두 분봉으로 취급합니다.
    pub fn from_yahoo_interval(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Granularity::Daily),
            "1h" | "60m" => Some(Granularity::Hourly),
            "1m" | "2m" | "5m" | "15m" | "30m" => Some(Granularity::SubHourly),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_yahoo_interval())
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yahoo_interval(s).ok_or_else(|| CoreError::UnknownGranularity(s.to_string()))
    }
}

/// 최신 시세 조회 시 거슬러 올라갈 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookback {
    /// 최근 1거래일
    OneDay,
}

impl Lookback {
    /// Yahoo Finance range 문자열로 변환합니다.
    pub fn to_yahoo_range(&self) -> &'static str {
        match self {
            Lookback::OneDay => "1d",
        }
    }
}

/// 공급자 조회 요청.
///
/// 백필은 명시적 구간을, 폴링은 최근 기간의 마지막 샘플을 요청합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    /// `[start, end)` 구간의 모든 샘플
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    },
    /// `lookback` 기간 중 가장 최근 샘플
    Latest {
        lookback: Lookback,
        granularity: Granularity,
    },
}

impl FetchRequest {
    /// 폴링 모드의 기본 요청 (최근 1일, 1분봉).
    pub fn latest() -> Self {
        FetchRequest::Latest {
            lookback: Lookback::OneDay,
            granularity: Granularity::SubHourly,
        }
    }

    /// 요청의 샘플링 단위.
    pub fn granularity(&self) -> Granularity {
        match self {
            FetchRequest::Range { granularity, .. } | FetchRequest::Latest { granularity, .. } => {
                *granularity
            }
        }
    }
}
