//! 재시도 기반 시세 조회.
//!
//! 후보 심볼을 순서대로 시도하며, 심볼마다 최대 `max_attempts`번 호출합니다.
//! 실패(에러, 빈 결과, 타임아웃) 후에는 `attempt * base_delay`만큼 대기합니다.
//! 모든 후보가 실패하면 [`FetchFailure`]를 반환하며 패닉하거나 배치를 중단하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::QuoteSource;
use crate::shutdown::sleep_or_cancel;
use feed_core::{FetchRequest, Quote, SymbolSpec};

/// 선형 증가 백오프 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// `attempt`번째 실패 후 대기 시간.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// 최종 조회 실패.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchFailure {
    /// 모든 후보 심볼이 재시도 한도를 소진함
    #[error("all symbols exhausted ({symbols:?}, {attempts} attempts): {last_error}")]
    Exhausted {
        symbols: Vec<String>,
        attempts: u32,
        last_error: String,
    },
    /// 후보 심볼이 없음
    #[error("no provider symbol configured")]
    NoCandidates,
    /// 종료 신호로 중단됨
    #[error("cancelled")]
    Cancelled,
}

/// 조회 성공 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedQuotes {
    /// 실제로 데이터를 반환한 심볼
    pub symbol: String,
    /// 시간순 샘플 (비어 있지 않음)
    pub quotes: Vec<Quote>,
}

/// 재시도/백오프/대체 심볼을 처리하는 조회기.
#[derive(Clone)]
pub struct ProviderFetcher {
    source: Arc<dyn QuoteSource>,
    policy: RetryPolicy,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl ProviderFetcher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        policy: RetryPolicy,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            policy,
            timeout,
            shutdown,
        }
    }

    /// 후보 심볼을 순서대로 시도하여 첫 번째 비어 있지 않은 결과를 반환합니다.
    pub async fn fetch(
        &self,
        symbols: &SymbolSpec,
        request: &FetchRequest,
    ) -> Result<FetchedQuotes, FetchFailure> {
        if symbols.candidates().is_empty() {
            return Err(FetchFailure::NoCandidates);
        }

        let mut attempts = 0;
        let mut last_error = String::new();

        for symbol in symbols.candidates() {
            for attempt in 1..=self.policy.max_attempts {
                if self.shutdown.is_cancelled() {
                    return Err(FetchFailure::Cancelled);
                }
                attempts += 1;

                let result =
                    tokio::time::timeout(self.timeout, self.source.fetch_quotes(symbol, request))
                        .await;

                last_error = match result {
                    Ok(Ok(quotes)) if !quotes.is_empty() => {
                        debug!(
                            symbol = %symbol,
                            attempt = attempt,
                            rows = quotes.len(),
                            "조회 성공"
                        );
                        return Ok(FetchedQuotes {
                            symbol: symbol.clone(),
                            quotes,
                        });
                    }
                    Ok(Ok(_)) => "empty result".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => format!("timed out after {}s", self.timeout.as_secs()),
                };

                warn!(
                    provider = self.source.name(),
                    symbol = %symbol,
                    attempt = attempt,
                    max_attempts = self.policy.max_attempts,
                    error = %last_error,
                    "조회 실패"
                );

                if attempt < self.policy.max_attempts {
                    let delay = self.policy.delay_for(attempt);
                    if !sleep_or_cancel(delay, &self.shutdown).await {
                        return Err(FetchFailure::Cancelled);
                    }
                }
            }
        }

        Err(FetchFailure::Exhausted {
            symbols: symbols.candidates().to_vec(),
            attempts,
            last_error,
        })
    }
}
