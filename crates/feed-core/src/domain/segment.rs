//! 과거 데이터 구간 계획기.
//!
//! 긴 백필 구간을 공급자 데이터 밀도에 맞춰 세 부분으로 나눕니다.
//!
//! ```text
//!  window_start                      now-60d            now-7d        now
//!      │◄──────── 일봉 (Daily) ────────►│                   │            │
//!                                       │◄── 시간봉 ───────►│            │
//!                                                           │◄─ 분봉 ───►│
//! ```
//!
//! 계획기는 I/O 없이 세 시각만으로 결과가 결정됩니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, CoreResult, Granularity};

/// 일봉 구간이 최소한 커버하는 기간 (일).
pub const HISTORY_TAIL_DAYS: i64 = 60;

/// 분봉을 요청하는 최근 기간 (일).
pub const SUB_HOURLY_DAYS: i64 = 7;

/// 샘플링 단위가 지정된 조회 구간. 항상 `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl Segment {
    /// 구간을 생성합니다. `start >= end`이면 에러를 반환합니다.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::InvalidSegment {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self {
            start,
            end,
            granularity,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} ~ {}] {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M"),
            self.granularity
        )
    }
}

/// 백필 구간 계획기.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentPlanner;

impl SegmentPlanner {
    /// `[window_start, min(window_end, now)]`를 일봉 → 시간봉 → 분봉 순서의 구간으로 나눕니다.
    ///
    /// - 일봉: `window_start`부터 `max(window_start+60d, now-60d)`까지.
    ///   시간봉 구간 앞에 빈틈이 생기지 않도록 끝을 `now-60d`까지 늘립니다.
    /// - 시간봉: `max(now-60d, window_start)`부터 `now-7d`까지
    /// - 분봉: `max(now-7d, window_start)`부터 `now`까지
    ///
    /// 모든 구간은 `min(window_end, now)`에서 잘리며, 잘린 뒤 비어 있는 구간은 제외됩니다.
    pub fn plan(
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<Segment> {
        let end = window_end.min(now);
        let hourly_from = now - Duration::days(HISTORY_TAIL_DAYS);
        let minute_from = now - Duration::days(SUB_HOURLY_DAYS);

        let daily_end = (window_start + Duration::days(HISTORY_TAIL_DAYS))
            .max(hourly_from)
            .min(end);

        let candidates = [
            (window_start, daily_end, Granularity::Daily),
            (hourly_from.max(window_start), minute_from.min(end), Granularity::Hourly),
            (minute_from.max(window_start), end, Granularity::SubHourly),
        ];

        candidates
            .into_iter()
            .filter_map(|(start, end, granularity)| Segment::new(start, end, granularity).ok())
            .collect()
    }
}
