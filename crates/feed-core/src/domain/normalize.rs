//! 시세 값 정규화.
//!
//! 공급자의 부동소수점 시세는 의미 있는 값(예: 7.50) 주변에서 미세하게 흔들립니다.
//! 정규화기는 값이 단순한 분수에 충분히 가까우면 그 값으로 맞추고,
//! 그렇지 않으면 정해진 소수점 자릿수로 반올림(half-up)합니다.
//!
//! | 컨텍스트 | epsilon | 스냅 대상 | 반올림 자릿수 |
//! |----------|---------|-----------|---------------|
//! | 과거 데이터 | 0.0001 | 정수 | 4 |
//! | 실시간 폴링 | 0.0001 | 정수, 0.5, 0.25 | 6 |

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use std::str::FromStr;
use tracing::error;

use crate::{CoreError, CoreResult};

/// 달러 인덱스 근사식의 기준 상수.
pub const USD_INDEX_BASE: f64 = 88.3;

/// 정규화 컨텍스트.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeContext {
    /// 과거 데이터 백필
    HistoricalImport,
    /// 실시간 폴링
    LivePoll,
}

/// 스냅 후 반올림 방식의 값 정규화기.
#[derive(Debug, Clone)]
pub struct Normalizer {
    epsilon: Decimal,
    /// 시도할 분모 (1 = 정수, 2 = 0.5 단위, 4 = 0.25 단위)
    snap_denominators: Vec<u32>,
    decimal_places: u32,
}

impl Normalizer {
    /// 컨텍스트에 맞는 정규화기를 생성합니다.
    pub fn for_context(context: NormalizeContext) -> Self {
        match context {
            NormalizeContext::HistoricalImport => Self::historical(),
            NormalizeContext::LivePoll => Self::live(),
        }
    }

    /// 과거 데이터용: 정수 스냅, 소수점 4자리.
    pub fn historical() -> Self {
        Self {
            epsilon: Decimal::new(1, 4),
            snap_denominators: vec![1],
            decimal_places: 4,
        }
    }

    /// 실시간 폴링용: 정수/0.5/0.25 스냅, 소수점 6자리.
    pub fn live() -> Self {
        Self {
            epsilon: Decimal::new(1, 4),
            snap_denominators: vec![1, 2, 4],
            decimal_places: 6,
        }
    }

    /// 값을 정규화합니다.
    ///
    /// 변환할 수 없는 값(NaN, 무한대, 범위 초과)은 에러 로그를 남기고 그대로 반환합니다.
    pub fn normalize(&self, raw: f64) -> f64 {
        match self.try_normalize(raw) {
            Ok(value) => value,
            Err(e) => {
                error!(value = raw, error = %e, "값 정규화 실패, 원본 값 사용");
                raw
            }
        }
    }

    /// 값을 정규화합니다. 변환 실패 시 에러를 반환합니다.
    pub fn try_normalize(&self, raw: f64) -> CoreResult<f64> {
        let dec = to_decimal(raw)?;
        let canonical = self.normalize_decimal(dec);
        canonical
            .normalize()
            .to_string()
            .parse::<f64>()
            .map_err(|e| CoreError::NonNumeric(format!("{}: {}", canonical, e)))
    }

    /// Decimal 값을 정규화합니다.
    pub fn normalize_decimal(&self, value: Decimal) -> Decimal {
        for &denominator in &self.snap_denominators {
            if let Some(snapped) = nearest_fraction(value, denominator) {
                if (value - snapped).abs() < self.epsilon {
                    return snapped;
                }
            }
        }

        value.round_dp_with_strategy(self.decimal_places, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// EUR/USD 종가로 달러 인덱스 근사값을 계산합니다.
///
/// `usd_index = normalize((1 / eur_usd) * 88.3)`
pub fn derive_usd_index(eur_usd_close: f64, normalizer: &Normalizer) -> CoreResult<f64> {
    if !eur_usd_close.is_finite() || eur_usd_close <= 0.0 {
        return Err(CoreError::Derivation(format!(
            "EUR/USD 종가가 유효하지 않습니다: {}",
            eur_usd_close
        )));
    }
    Ok(normalizer.normalize((1.0 / eur_usd_close) * USD_INDEX_BASE))
}

/// `1/denominator` 단위의 가장 가까운 값.
fn nearest_fraction(value: Decimal, denominator: u32) -> Option<Decimal> {
    let denominator = Decimal::from(denominator);
    value
        .checked_mul(denominator)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.checked_div(denominator))
}

/// f64를 최단 십진 표현으로 Decimal 변환합니다.
pub fn to_decimal(raw: f64) -> CoreResult<Decimal> {
    if !raw.is_finite() {
        return Err(CoreError::NonNumeric(raw.to_string()));
    }
    Decimal::from_str(&raw.to_string()).map_err(|e| CoreError::NonNumeric(format!("{}: {}", raw, e)))
}
