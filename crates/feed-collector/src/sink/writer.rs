//! 다중 싱크 기록기.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Sink, SinkOutcome, WriteReport};
use crate::fetcher::RetryPolicy;
use crate::shutdown::sleep_or_cancel;
use feed_core::{Observation, WriteOutcome};

/// 활성화된 모든 싱크에 관측값을 기록합니다.
///
/// 싱크마다 독립적으로 재시도하며, 한 싱크의 실패가 다른 싱크의 기록을 막지 않습니다.
/// 재연결을 지원하는 싱크는 재시도 전에 재연결을 먼저 시도합니다.
pub struct SinkWriter {
    sinks: Vec<Arc<dyn Sink>>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl SinkWriter {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, policy: RetryPolicy, shutdown: CancellationToken) -> Self {
        Self {
            sinks,
            policy,
            shutdown,
        }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// 관측값 하나를 모든 싱크에 기록합니다. 에러를 반환하지 않습니다.
    pub async fn write(&self, observation: &Observation) -> WriteReport {
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let outcome = self.write_with_retry(sink.as_ref(), observation).await;
            outcomes.push(SinkOutcome {
                sink: sink.name().to_string(),
                outcome,
            });
        }

        let report = WriteReport::new(outcomes);
        if !report.is_success() {
            error!(
                instrument = %observation.instrument,
                timestamp = %observation.timestamp,
                "모든 저장소 기록 실패"
            );
        }
        report
    }

    async fn write_with_retry(&self, sink: &dyn Sink, observation: &Observation) -> WriteOutcome {
        for attempt in 1..=self.policy.max_attempts {
            match sink.write(observation).await {
                Ok(outcome) => {
                    debug!(
                        sink = sink.name(),
                        instrument = %observation.instrument,
                        value = observation.value,
                        outcome = %outcome,
                        "기록 완료"
                    );
                    return outcome;
                }
                Err(e) => {
                    warn!(
                        sink = sink.name(),
                        instrument = %observation.instrument,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "기록 실패"
                    );
                }
            }

            if attempt == self.policy.max_attempts {
                break;
            }
            if !sleep_or_cancel(self.policy.delay_for(attempt), &self.shutdown).await {
                break;
            }
            if sink.supports_reconnect() {
                if let Err(e) = sink.reconnect().await {
                    warn!(sink = sink.name(), error = %e, "재연결 실패");
                }
            }
        }

        error!(
            sink = sink.name(),
            instrument = %observation.instrument,
            timestamp = %observation.timestamp,
            "재시도 후에도 기록 실패"
        );
        WriteOutcome::Failed
    }

    /// 모든 싱크의 재연결을 시도합니다. 실패한 싱크 수를 반환합니다.
    pub async fn reconnect_all(&self) -> usize {
        let mut failed = 0;
        for sink in self.sinks.iter().filter(|s| s.supports_reconnect()) {
            if let Err(e) = sink.reconnect().await {
                error!(sink = sink.name(), error = %e, "재연결 실패");
                failed += 1;
            }
        }
        failed
    }

    /// 모든 싱크의 자원을 정리합니다.
    pub async fn close(&self) {
        for sink in &self.sinks {
            sink.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use feed_core::Instrument;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// 키 중복을 검사하는 메모리 싱크. 앞의 `fail_first`번 호출은 실패합니다.
    #[derive(Default)]
    struct MemorySink {
        name: &'static str,
        keys: Mutex<HashSet<String>>,
        fail_first: u32,
        always_fail: bool,
        calls: AtomicU32,
        reconnects: AtomicU32,
    }

    impl MemorySink {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Sink for MemorySink {
        fn name(&self) -> &str {
            self.name
        }

        async fn write(&self, observation: &Observation) -> Result<WriteOutcome, SinkError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.always_fail || call <= self.fail_first {
                return Err(SinkError::Unavailable("connection refused".into()));
            }
            let key = format!("{}@{}", observation.instrument, observation.timestamp);
            if self.keys.lock().unwrap().insert(key) {
                Ok(WriteOutcome::Written)
            } else {
                Ok(WriteOutcome::DuplicateSkipped)
            }
        }

        fn supports_reconnect(&self) -> bool {
            true
        }

        async fn reconnect(&self) -> Result<(), SinkError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn observation() -> Observation {
        Observation::new(
            Instrument::exchange_rate("EUR"),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            0.9201,
        )
    }

    fn writer(sinks: Vec<Arc<dyn Sink>>) -> SinkWriter {
        SinkWriter::new(
            sinks,
            RetryPolicy::new(3, Duration::from_secs(1)),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_replay_is_duplicate_skipped() {
        let sink = Arc::new(MemorySink::named("postgres"));
        let writer = writer(vec![sink.clone() as Arc<dyn Sink>]);

        let first = writer.write(&observation()).await;
        let second = writer.write(&observation()).await;

        assert_eq!(first.outcome_for("postgres"), Some(WriteOutcome::Written));
        assert_eq!(
            second.outcome_for("postgres"),
            Some(WriteOutcome::DuplicateSkipped)
        );
        assert!(second.is_success());
        assert_eq!(sink.keys.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_sink_failure_still_succeeds() {
        let relational = Arc::new(MemorySink {
            always_fail: true,
            ..MemorySink::named("postgres")
        });
        let timeseries = Arc::new(MemorySink::named("influxdb"));
        let writer = writer(vec![relational.clone() as Arc<dyn Sink>, timeseries.clone()]);

        let report = writer.write(&observation()).await;

        assert!(report.is_success());
        assert!(report.has_failures());
        assert_eq!(report.outcome_for("postgres"), Some(WriteOutcome::Failed));
        assert_eq!(report.outcome_for("influxdb"), Some(WriteOutcome::Written));
        assert_eq!(relational.calls.load(Ordering::SeqCst), 3);
        assert_eq!(timeseries.keys.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_linear_backoff_and_reconnect() {
        let sink = Arc::new(MemorySink {
            fail_first: 2,
            ..MemorySink::named("postgres")
        });
        let writer = writer(vec![sink.clone() as Arc<dyn Sink>]);

        let start = Instant::now();
        let report = writer.write(&observation()).await;

        assert_eq!(report.outcome_for("postgres"), Some(WriteOutcome::Written));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.reconnects.load(Ordering::SeqCst), 2);
        // 1초 + 2초
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_sinks_failed() {
        let writer = writer(vec![
            Arc::new(MemorySink {
                always_fail: true,
                ..MemorySink::named("postgres")
            }) as Arc<dyn Sink>,
            Arc::new(MemorySink {
                always_fail: true,
                ..MemorySink::named("influxdb")
            }),
        ]);

        let report = writer.write(&observation()).await;
        assert!(!report.is_success());
        assert_eq!(
            report.outcomes().collect::<Vec<_>>(),
            vec![WriteOutcome::Failed, WriteOutcome::Failed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retrying() {
        let sink = Arc::new(MemorySink {
            always_fail: true,
            ..MemorySink::named("postgres")
        });
        let token = CancellationToken::new();
        token.cancel();
        let writer = SinkWriter::new(
            vec![sink.clone() as Arc<dyn Sink>],
            RetryPolicy::new(3, Duration::from_secs(1)),
            token,
        );

        let report = writer.write(&observation()).await;
        assert_eq!(report.outcome_for("postgres"), Some(WriteOutcome::Failed));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_all() {
        let sink = Arc::new(MemorySink::named("postgres"));
        let writer = writer(vec![sink.clone() as Arc<dyn Sink>]);
        assert_eq!(writer.reconnect_all().await, 0);
        assert_eq!(sink.reconnects.load(Ordering::SeqCst), 1);
        assert_eq!(writer.sink_names(), vec!["postgres"]);
    }
}
