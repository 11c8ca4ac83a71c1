//! 환경변수 기반 설정 모듈.
//!
//! 프로세스 시작 시 한 번 로드되며 이후 변경되지 않습니다.
//! 각 컴포넌트는 생성 시 필요한 설정을 참조로 전달받습니다.

use chrono::{DateTime, NaiveDate, Utc};
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CollectorError;
use crate::fetcher::RetryPolicy;
use crate::Result;
use feed_core::SymbolCatalog;

const DEFAULT_CURRENCIES: [&str; 11] = [
    "CNH", "CNY", "HKD", "JPY", "KRW", "SGD", "RUB", "TWD", "AUD", "GBP", "EUR",
];

const DEFAULT_HISTORY_START_DATE: &str = "2017-07-01";

/// Collector 전체 설정
#[derive(Debug)]
pub struct CollectorConfig {
    /// 수집 대상 상품
    pub instruments: InstrumentConfig,
    /// 백필 설정
    pub backfill: BackfillConfig,
    /// 폴링 설정
    pub poll: PollConfig,
    /// 공급자 조회 설정
    pub fetch: FetchConfig,
    /// 저장소 설정
    pub sinks: SinkConfig,
}

/// 수집 대상 상품 설정
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    /// 통화 코드 목록 (USD 기준 환율)
    pub currencies: Vec<String>,
    /// 시장 코드 → 지수 심볼 목록
    pub stocks: BTreeMap<String, Vec<String>>,
}

/// 백필 설정
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillConfig {
    /// 백필 시작 날짜
    pub start_date: NaiveDate,
    /// 백필 종료 날짜, 해당 날짜 포함 (없으면 현재 시각까지)
    pub end_date: Option<NaiveDate>,
    /// 구간 사이 대기 (밀리초)
    pub segment_pause_ms: u64,
    /// 상품 사이 대기 (밀리초)
    pub instrument_pause_ms: u64,
    /// 상품 단위 에러 후 대기 (밀리초)
    pub error_pause_ms: u64,
    /// 전체 실행 제한 시간 (분)
    pub deadline_minutes: Option<u64>,
}

/// 폴링 사이클 전체 실패 시 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleFailurePolicy {
    /// 정리 후 재연결하고 다음 사이클 계속
    #[default]
    Restart,
    /// 정리 후 루프 종료
    Exit,
}

impl FromStr for CycleFailurePolicy {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "restart" => Ok(Self::Restart),
            "exit" => Ok(Self::Exit),
            other => Err(CollectorError::Config(format!(
                "POLL_FAILURE_POLICY는 restart 또는 exit 이어야 합니다: {}",
                other
            ))),
        }
    }
}

/// 폴링 설정
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// 사이클 주기 (초)
    pub interval_secs: u64,
    /// 상품 요청 사이 대기 (밀리초)
    pub request_pause_ms: u64,
    /// 사이클 전체 실패 시 동작
    pub failure_policy: CycleFailurePolicy,
}

/// 공급자 조회 설정
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// 심볼당 최대 시도 횟수
    pub max_attempts: u32,
    /// 백오프 기본 간격 (초). n번째 실패 후 `n * backoff_secs` 대기
    pub backoff_secs: u64,
    /// 공급자 호출 1회 제한 시간 (초)
    pub timeout_secs: u64,
}

/// 저장소 설정
#[derive(Debug)]
pub struct SinkConfig {
    /// 싱크당 최대 시도 횟수
    pub max_attempts: u32,
    /// 재시도 기본 간격 (초)
    pub backoff_secs: u64,
    /// Postgres (비활성화 시 None)
    pub postgres: Option<PostgresConfig>,
    /// InfluxDB (비활성화 시 None)
    pub influx: Option<InfluxConfig>,
}

/// Postgres 연결 설정
#[derive(Debug)]
pub struct PostgresConfig {
    pub url: SecretString,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// InfluxDB v2 연결 설정
#[derive(Debug)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: SecretString,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드. `.env` 로드는 호출자가 먼저 수행합니다.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로부터 설정 로드 (테스트에서 환경변수 대신 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);

        let currencies = match env.get("CURRENCIES") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                CollectorError::Config(format!("CURRENCIES JSON 파싱 실패: {}", e))
            })?,
            None => DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
        };

        let stocks = match env.get("STOCKS") {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| CollectorError::Config(format!("STOCKS JSON 파싱 실패: {}", e)))?,
            None => default_stocks(),
        };

        let start_date = parse_date(
            "HISTORY_START_DATE",
            &env.get("HISTORY_START_DATE")
                .unwrap_or_else(|| DEFAULT_HISTORY_START_DATE.to_string()),
        )?;
        let end_date = env
            .get("HISTORY_END_DATE")
            .map(|raw| parse_date("HISTORY_END_DATE", &raw))
            .transpose()?;

        let failure_policy = env
            .get("POLL_FAILURE_POLICY")
            .map(|raw| raw.parse::<CycleFailurePolicy>())
            .transpose()?
            .unwrap_or_default();

        let postgres = if env.bool("POSTGRES_ENABLED", true) {
            let url = env.get("DATABASE_URL").ok_or_else(|| {
                CollectorError::Config(
                    "POSTGRES_ENABLED=true 이지만 DATABASE_URL 환경변수가 설정되지 않았습니다"
                        .to_string(),
                )
            })?;
            Some(PostgresConfig {
                url: SecretString::new(url.into()),
                max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 5),
                connect_timeout_secs: env.parse("DATABASE_CONNECT_TIMEOUT_SECS", 30),
            })
        } else {
            None
        };

        let influx = if env.bool("INFLUXDB_ENABLED", false) {
            let required = |key: &str| {
                env.get(key).ok_or_else(|| {
                    CollectorError::Config(format!(
                        "INFLUXDB_ENABLED=true 이지만 {} 환경변수가 설정되지 않았습니다",
                        key
                    ))
                })
            };
            Some(InfluxConfig {
                url: required("INFLUXDB_URL")?,
                org: required("INFLUXDB_ORG")?,
                bucket: required("INFLUXDB_BUCKET")?,
                token: SecretString::new(required("INFLUXDB_TOKEN")?.into()),
            })
        } else {
            None
        };

        let config = Self {
            instruments: InstrumentConfig { currencies, stocks },
            backfill: BackfillConfig {
                start_date,
                end_date,
                segment_pause_ms: env.parse("BACKFILL_SEGMENT_PAUSE_MS", 1_000),
                instrument_pause_ms: env.parse("BACKFILL_INSTRUMENT_PAUSE_MS", 2_000),
                error_pause_ms: env.parse("BACKFILL_ERROR_PAUSE_MS", 5_000),
                deadline_minutes: env.get("BACKFILL_DEADLINE_MINUTES").and_then(|v| v.parse().ok()),
            },
            poll: PollConfig {
                interval_secs: env.parse("FETCH_INTERVAL", 3_600),
                request_pause_ms: env.parse("POLL_REQUEST_PAUSE_MS", 2_000),
                failure_policy,
            },
            fetch: FetchConfig {
                max_attempts: env.parse("FETCH_MAX_ATTEMPTS", 3),
                backoff_secs: env.parse("FETCH_BACKOFF_SECS", 5),
                timeout_secs: env.parse("FETCH_TIMEOUT_SECS", 30),
            },
            sinks: SinkConfig {
                max_attempts: env.parse("SINK_MAX_ATTEMPTS", 3),
                backoff_secs: env.parse("SINK_BACKOFF_SECS", 1),
                postgres,
                influx,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 시작 시 검증. 실패는 치명적이며 재시도하지 않습니다.
    pub fn validate(&self) -> Result<()> {
        if self.sinks.postgres.is_none() && self.sinks.influx.is_none() {
            return Err(CollectorError::Config(
                "활성화된 저장소가 없습니다 (POSTGRES_ENABLED / INFLUXDB_ENABLED)".to_string(),
            ));
        }
        if self.fetch.max_attempts == 0 || self.sinks.max_attempts == 0 {
            return Err(CollectorError::Config(
                "최대 시도 횟수는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.poll.interval_secs == 0 {
            return Err(CollectorError::Config(
                "FETCH_INTERVAL은 1초 이상이어야 합니다".to_string(),
            ));
        }
        if let Some(end) = self.backfill.end_date {
            if end < self.backfill.start_date {
                return Err(CollectorError::Config(format!(
                    "HISTORY_END_DATE({})가 HISTORY_START_DATE({})보다 빠릅니다",
                    end, self.backfill.start_date
                )));
            }
        }
        Ok(())
    }
}

impl InstrumentConfig {
    /// 공급자 심볼 카탈로그 생성
    pub fn catalog(&self) -> SymbolCatalog {
        SymbolCatalog::new(&self.currencies, &self.stocks)
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2017, 7, 1).unwrap_or_default(),
            end_date: None,
            segment_pause_ms: 1_000,
            instrument_pause_ms: 2_000,
            error_pause_ms: 5_000,
            deadline_minutes: None,
        }
    }
}

impl BackfillConfig {
    /// 백필 구간 `[start_date 00:00 UTC, end_date 다음 날 00:00 UTC 또는 now)`
    ///
    /// 종료 날짜 당일의 데이터까지 포함합니다.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = self
            .end_date
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc() + chrono::Duration::days(1))
            .unwrap_or(now);
        (start, end)
    }

    pub fn segment_pause(&self) -> Duration {
        Duration::from_millis(self.segment_pause_ms)
    }

    pub fn instrument_pause(&self) -> Duration {
        Duration::from_millis(self.instrument_pause_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_minutes
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3_600,
            request_pause_ms: 2_000,
            failure_policy: CycleFailurePolicy::Restart,
        }
    }
}

impl PollConfig {
    /// 사이클 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_pause(&self) -> Duration {
        Duration::from_millis(self.request_pause_ms)
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SinkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs))
    }
}

fn default_stocks() -> BTreeMap<String, Vec<String>> {
    [
        ("US", vec!["^DJI", "^GSPC", "^IXIC"]),
        ("HK", vec!["^HSI"]),
        ("CN", vec!["000001.SS", "399001.SZ"]),
    ]
    .into_iter()
    .map(|(market, symbols)| {
        (
            market.to_string(),
            symbols.into_iter().map(str::to_string).collect(),
        )
    })
    .collect()
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        CollectorError::Config(format!("{} 날짜 형식 오류 ({}): {}", key, raw, e))
    })
}

/// 조회 함수 래퍼
struct Lookup<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// 값을 파싱 (실패 시 기본값 사용)
    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// bool 값 파싱
    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }
}
