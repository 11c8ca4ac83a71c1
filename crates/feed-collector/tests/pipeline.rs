//! 수집 파이프라인 통합 테스트.
//!
//! 메모리 공급자와 메모리 싱크로 백필/폴링 전체 흐름을 검증합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use feed_collector::config::{BackfillConfig, CycleFailurePolicy, PollConfig};
use feed_collector::{
    modules, CollectorError, IngestContext, ProviderFetcher, QuoteSource, RetryPolicy, Sink,
    SinkError, SinkWriter,
};
use feed_core::{FetchRequest, Instrument, Observation, Quote, SymbolCatalog, WriteOutcome};

/// 심볼별 고정 응답을 돌려주는 공급자. 등록되지 않은 심볼은 빈 결과.
#[derive(Default)]
struct StubSource {
    quotes: HashMap<String, Vec<Quote>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl StubSource {
    fn with(mut self, symbol: &str, quotes: Vec<Quote>) -> Self {
        self.quotes.insert(symbol.to_string(), quotes);
        self
    }

    fn calls(&self, symbol: &str) -> u32 {
        self.calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl QuoteSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch_quotes(
        &self,
        symbol: &str,
        _request: &FetchRequest,
    ) -> feed_collector::Result<Vec<Quote>> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;
        Ok(self.quotes.get(symbol).cloned().unwrap_or_default())
    }
}

/// (상품, 시각) 키로 관측값을 보관하는 싱크.
#[derive(Default)]
struct MemorySink {
    name: &'static str,
    rows: Mutex<BTreeMap<String, Observation>>,
    always_fail: bool,
    reconnects: AtomicU32,
}

impl MemorySink {
    fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            name,
            always_fail: true,
            ..Default::default()
        }
    }

    fn rows(&self) -> Vec<Observation> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        self.name
    }

    async fn write(&self, observation: &Observation) -> Result<WriteOutcome, SinkError> {
        if self.always_fail {
            return Err(SinkError::Unavailable("connection refused".into()));
        }
        let key = format!("{}@{}", observation.instrument, observation.timestamp);
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&key) {
            return Ok(WriteOutcome::DuplicateSkipped);
        }
        rows.insert(key, observation.clone());
        Ok(WriteOutcome::Written)
    }

    fn supports_reconnect(&self) -> bool {
        true
    }

    async fn reconnect(&self) -> Result<(), SinkError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
}

fn eur_source() -> StubSource {
    StubSource::default().with("USDEUR=X", vec![Quote::new(ts(), 0.9201)])
}

fn context(
    source: Arc<StubSource>,
    sinks: Vec<Arc<dyn Sink>>,
    shutdown: CancellationToken,
) -> IngestContext {
    let catalog = SymbolCatalog::new(&["EUR".to_string(), "JPY".to_string()], &BTreeMap::new());
    let fetcher = ProviderFetcher::new(
        source,
        RetryPolicy::new(3, Duration::from_secs(5)),
        Duration::from_secs(30),
        shutdown.clone(),
    );
    let writer = SinkWriter::new(sinks, RetryPolicy::new(3, Duration::from_secs(1)), shutdown.clone());
    IngestContext::new(catalog, fetcher, writer, shutdown)
}

fn backfill_config() -> BackfillConfig {
    BackfillConfig {
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
        ..Default::default()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_backfill_stores_eur_and_continues_past_jpy() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::named("postgres"));
    let ctx = context(
        source.clone(),
        vec![sink.clone() as Arc<dyn Sink>],
        CancellationToken::new(),
    );

    let stats = modules::run_backfill(&ctx, &backfill_config(), now()).await;

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].instrument, Instrument::exchange_rate("EUR"));
    assert_eq!(rows[0].value, 0.9201);
    assert_eq!(rows[0].timestamp, ts());

    assert_eq!(source.calls("USDJPY=X"), 3);
    assert_eq!(stats.instruments, 3);
    // 달러 인덱스(EURUSD=X)와 JPY
    assert_eq!(stats.fetch_failures, 2);
    assert_eq!(stats.written, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backfill_replay_is_idempotent() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::named("postgres"));
    let ctx = context(
        source,
        vec![sink.clone() as Arc<dyn Sink>],
        CancellationToken::new(),
    );

    modules::run_backfill(&ctx, &backfill_config(), now()).await;
    let replay = modules::run_backfill(&ctx, &backfill_config(), now()).await;

    assert_eq!(sink.rows().len(), 1);
    assert_eq!(replay.written, 0);
    assert_eq!(replay.duplicates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backfill_derives_usd_index() {
    let source = Arc::new(
        eur_source().with("EURUSD=X", vec![Quote::new(ts(), 1.085)]),
    );
    let sink = Arc::new(MemorySink::named("postgres"));
    let ctx = context(
        source,
        vec![sink.clone() as Arc<dyn Sink>],
        CancellationToken::new(),
    );

    modules::run_backfill(&ctx, &backfill_config(), now()).await;

    let index: Vec<Observation> = sink
        .rows()
        .into_iter()
        .filter(|o| o.instrument == Instrument::UsdIndex)
        .collect();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].value, 81.3825);
}

#[tokio::test(start_paused = true)]
async fn test_backfill_stops_when_cancelled() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::named("postgres"));
    let token = CancellationToken::new();
    token.cancel();
    let ctx = context(source.clone(), vec![sink.clone() as Arc<dyn Sink>], token);

    let stats = modules::run_backfill(&ctx, &backfill_config(), now()).await;

    assert_eq!(stats.instruments, 0);
    assert!(sink.rows().is_empty());
    assert_eq!(source.calls("USDEUR=X"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_cycle_partial_sink_failure() {
    let source = Arc::new(eur_source());
    let relational = Arc::new(MemorySink::failing("postgres"));
    let timeseries = Arc::new(MemorySink::named("influxdb"));
    let ctx = context(
        source,
        vec![relational.clone() as Arc<dyn Sink>, timeseries.clone()],
        CancellationToken::new(),
    );

    let stats = modules::run_cycle(&ctx, &PollConfig::default()).await;

    assert_eq!(stats.observations, 1);
    assert_eq!(stats.written, 1);
    assert_eq!(stats.partial_failures, 1);
    assert_eq!(stats.failed, 0);
    // 기록 여부는 성공한 시계열 싱크에서 확인
    let rows = timeseries.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, 0.9201);
    assert!(relational.rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_loop_exit_policy() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::failing("postgres"));
    let ctx = context(
        source.clone(),
        vec![sink.clone() as Arc<dyn Sink>],
        CancellationToken::new(),
    );
    let config = PollConfig {
        failure_policy: CycleFailurePolicy::Exit,
        ..Default::default()
    };

    let err = modules::run_poll_loop(&ctx, &config).await.unwrap_err();

    assert!(matches!(err, CollectorError::CycleFailed { cycle: 1 }));
    assert_eq!(source.calls("USDEUR=X"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_loop_shutdown_during_sink_outage_is_clean() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::failing("postgres"));
    let token = CancellationToken::new();
    let ctx = context(
        source.clone(),
        vec![sink.clone() as Arc<dyn Sink>],
        token.clone(),
    );
    let config = PollConfig {
        failure_policy: CycleFailurePolicy::Exit,
        ..Default::default()
    };

    // 달러 인덱스 조회 실패(5s + 10s) 후 EUR 기록 재시도 대기 중에 종료
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        token.cancel();
    });

    let stats = modules::run_poll_loop(&ctx, &config).await.unwrap();

    assert_eq!(source.calls("USDEUR=X"), 1);
    assert_eq!(stats.observations, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(sink.reconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_loop_restart_policy_keeps_running() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::failing("postgres"));
    let token = CancellationToken::new();
    let ctx = context(
        source.clone(),
        vec![sink.clone() as Arc<dyn Sink>],
        token.clone(),
    );
    let config = PollConfig {
        failure_policy: CycleFailurePolicy::Restart,
        ..Default::default()
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3 * 3_600 - 60)).await;
        token.cancel();
    });

    let stats = modules::run_poll_loop(&ctx, &config).await.unwrap();

    assert_eq!(source.calls("USDEUR=X"), 3);
    assert_eq!(stats.observations, 3);
    assert_eq!(stats.failed, 3);
    // 기록 재시도 사이 2회 + 사이클 실패 후 1회
    assert_eq!(sink.reconnects.load(Ordering::SeqCst), 9);
}

#[tokio::test(start_paused = true)]
async fn test_poll_loop_stops_on_shutdown() {
    let source = Arc::new(eur_source());
    let sink = Arc::new(MemorySink::named("postgres"));
    let token = CancellationToken::new();
    let ctx = context(
        source.clone(),
        vec![sink.clone() as Arc<dyn Sink>],
        token.clone(),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(600)).await;
        token.cancel();
    });

    let stats = modules::run_poll_loop(&ctx, &PollConfig::default()).await.unwrap();

    assert_eq!(source.calls("USDEUR=X"), 1);
    assert_eq!(stats.written, 1);
    assert_eq!(sink.rows().len(), 1);
}
