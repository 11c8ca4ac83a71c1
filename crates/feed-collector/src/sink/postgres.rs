//! Postgres 관계형 싱크.
//!
//! 세 테이블(`exchange_rates`, `stock_prices`, `usd_index`)에 관측값을 기록합니다.
//! 중복 방지는 유니크 제약 + `ON CONFLICT DO NOTHING`으로 처리하며,
//! 영향받은 행이 0이면 이미 존재하는 관측값입니다.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::Sink;
use crate::config::PostgresConfig;
use crate::error::SinkError;
use crate::modules::reconcile::stale_keys;
use crate::Result;
use feed_core::{to_decimal, Instrument, Observation, WriteOutcome};

/// Postgres 싱크.
#[derive(Clone)]
pub struct PostgresSink {
    pool: PgPool,
}

/// 정리 작업 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// 삭제 대상 통화 코드
    pub currencies: Vec<String>,
    /// 삭제 대상 (시장, 심볼)
    pub stocks: Vec<(String, String)>,
    /// 삭제된 환율 행 수
    pub exchange_rate_rows: u64,
    /// 삭제된 주가지수 행 수
    pub stock_price_rows: u64,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty() && self.stocks.is_empty()
    }
}

impl PostgresSink {
    /// 연결 풀을 생성합니다.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        info!("Postgres 연결 중...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(config.url.expose_secret())
            .await?;

        info!("Postgres 연결 완료");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 스키마 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("마이그레이션 실행 중...");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("마이그레이션 완료");
        Ok(())
    }

    /// 연결 상태를 확인합니다.
    pub async fn health_check(&self) -> std::result::Result<(), SinkError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 설정에 없는 통화/지수의 행을 삭제합니다.
    ///
    /// 하나의 트랜잭션에서 수행되며, 에러 시 전체가 롤백됩니다.
    #[instrument(skip(self, configured_currencies, configured_stocks))]
    pub async fn prune_unconfigured(
        &self,
        configured_currencies: &BTreeSet<String>,
        configured_stocks: &BTreeSet<(String, String)>,
    ) -> Result<PruneReport> {
        let mut tx = self.pool.begin().await?;

        let present_currencies: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT to_currency FROM exchange_rates")
                .fetch_all(&mut *tx)
                .await?;
        let present_stocks: Vec<(String, String)> =
            sqlx::query_as("SELECT DISTINCT market, symbol FROM stock_prices")
                .fetch_all(&mut *tx)
                .await?;

        let mut report = PruneReport {
            currencies: stale_keys(present_currencies, configured_currencies),
            stocks: stale_keys(present_stocks, configured_stocks),
            ..Default::default()
        };

        for currency in &report.currencies {
            let result = sqlx::query("DELETE FROM exchange_rates WHERE to_currency = $1")
                .bind(currency)
                .execute(&mut *tx)
                .await?;
            info!(currency = %currency, rows = result.rows_affected(), "미설정 통화 삭제");
            report.exchange_rate_rows += result.rows_affected();
        }

        for (market, symbol) in &report.stocks {
            let result = sqlx::query("DELETE FROM stock_prices WHERE market = $1 AND symbol = $2")
                .bind(market)
                .bind(symbol)
                .execute(&mut *tx)
                .await?;
            info!(
                market = %market,
                symbol = %symbol,
                rows = result.rows_affected(),
                "미설정 지수 삭제"
            );
            report.stock_price_rows += result.rows_affected();
        }

        tx.commit().await?;
        Ok(report)
    }
}

#[async_trait]
impl Sink for PostgresSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn write(&self, observation: &Observation) -> std::result::Result<WriteOutcome, SinkError> {
        let value = to_decimal(observation.value)
            .map_err(|e| SinkError::InvalidValue(e.to_string()))?;

        let result = match &observation.instrument {
            Instrument::ExchangeRate { base, quote } => {
                sqlx::query(
                    r#"
                    INSERT INTO exchange_rates (timestamp, from_currency, to_currency, rate)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (timestamp, from_currency, to_currency) DO NOTHING
                    "#,
                )
                .bind(observation.timestamp)
                .bind(base)
                .bind(quote)
                .bind(value)
                .execute(&self.pool)
                .await?
            }
            Instrument::StockPrice {
                market,
                symbol,
                currency,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO stock_prices (timestamp, market, symbol, price, currency, volume)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (timestamp, market, symbol) DO NOTHING
                    "#,
                )
                .bind(observation.timestamp)
                .bind(market)
                .bind(symbol)
                .bind(value)
                .bind(currency)
                .bind(observation.volume.unwrap_or(0))
                .execute(&self.pool)
                .await?
            }
            Instrument::UsdIndex => {
                sqlx::query(
                    r#"
                    INSERT INTO usd_index (timestamp, value)
                    VALUES ($1, $2)
                    ON CONFLICT (timestamp) DO NOTHING
                    "#,
                )
                .bind(observation.timestamp)
                .bind(value)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            debug!(instrument = %observation.instrument, timestamp = %observation.timestamp, "이미 존재하는 관측값");
            Ok(WriteOutcome::DuplicateSkipped)
        } else {
            Ok(WriteOutcome::Written)
        }
    }

    fn supports_reconnect(&self) -> bool {
        true
    }

    /// 풀은 끊어진 연결을 스스로 교체하므로, 새 연결이 실제로 열리는지만 확인합니다.
    async fn reconnect(&self) -> std::result::Result<(), SinkError> {
        match self.health_check().await {
            Ok(()) => {
                info!("Postgres 재연결 확인");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Postgres 재연결 실패");
                Err(e)
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Postgres 연결 풀 종료");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;

    const TEST_CURRENCY: &str = "ZZT";

    /// `DATABASE_URL`이 없으면 None.
    async fn connect_test_sink() -> Option<PostgresSink> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = PostgresConfig {
            url: SecretString::new(url.into()),
            max_connections: 2,
            connect_timeout_secs: 10,
        };
        PostgresSink::connect(&config).await.ok()
    }

    async fn count_rows(sink: &PostgresSink) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM exchange_rates WHERE to_currency = $1")
            .bind(TEST_CURRENCY)
            .fetch_one(sink.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore] // DB 연결 필요
    async fn test_duplicate_write_and_prune() {
        let sink = match connect_test_sink().await {
            Some(s) => s,
            None => {
                eprintln!("Skipping test: DATABASE_URL not set");
                return;
            }
        };
        sink.migrate().await.unwrap();

        let observation = Observation::new(
            Instrument::exchange_rate(TEST_CURRENCY),
            Utc.with_ymd_and_hms(2001, 1, 2, 0, 0, 0).unwrap(),
            1.2345,
        );

        assert_eq!(sink.write(&observation).await.unwrap(), WriteOutcome::Written);
        assert_eq!(
            sink.write(&observation).await.unwrap(),
            WriteOutcome::DuplicateSkipped
        );
        assert_eq!(count_rows(&sink).await, 1);

        // 테스트 통화만 미설정으로 두고 나머지 데이터는 유지
        let currencies: BTreeSet<String> =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT to_currency FROM exchange_rates")
                .fetch_all(sink.pool())
                .await
                .unwrap()
                .into_iter()
                .filter(|c| c != TEST_CURRENCY)
                .collect();
        let stocks: BTreeSet<(String, String)> =
            sqlx::query_as::<_, (String, String)>("SELECT DISTINCT market, symbol FROM stock_prices")
                .fetch_all(sink.pool())
                .await
                .unwrap()
                .into_iter()
                .collect();

        let report = sink.prune_unconfigured(&currencies, &stocks).await.unwrap();

        assert_eq!(report.currencies, vec![TEST_CURRENCY.to_string()]);
        assert!(report.stocks.is_empty());
        assert_eq!(report.exchange_rate_rows, 1);
        assert_eq!(count_rows(&sink).await, 0);

        sink.close().await;
    }
}
