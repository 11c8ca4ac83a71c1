//! InfluxDB v2 시계열 싱크.
//!
//! HTTP write API(`/api/v2/write`)로 line protocol 한 줄씩 전송합니다.
//! 포인트 키는 (measurement, tag set, timestamp)이므로 같은 관측값을 다시 쓰면
//! 덮어쓰기가 되어 중복 확인이 필요 없습니다.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use super::Sink;
use crate::config::InfluxConfig;
use crate::error::SinkError;
use crate::Result;
use feed_core::{Instrument, Observation, WriteOutcome};

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// InfluxDB v2 싱크.
pub struct InfluxSink {
    client: Client,
    write_url: String,
    org: String,
    bucket: String,
    /// `Token <token>` 형식의 Authorization 헤더 값
    authorization: SecretString,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = Client::builder().timeout(WRITE_TIMEOUT).build()?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            authorization: SecretString::from(format!("Token {}", config.token.expose_secret())),
        })
    }

    /// 관측값을 초 단위 정밀도의 line protocol로 변환합니다.
    ///
    /// ```text
    /// exchange_rates,from_currency=USD,to_currency=EUR rate=0.9201 1704153600
    /// stock_prices,market=US,symbol=^DJI,currency=USD price=37000,volume=1200i 1704153600
    /// usd_index value=81.3825 1704153600
    /// ```
    pub fn line_protocol(observation: &Observation) -> String {
        let timestamp = observation.timestamp.timestamp();
        let value = observation.value;

        match &observation.instrument {
            Instrument::ExchangeRate { base, quote } => format!(
                "exchange_rates,from_currency={},to_currency={} rate={} {}",
                escape_tag(base),
                escape_tag(quote),
                value,
                timestamp
            ),
            Instrument::StockPrice {
                market,
                symbol,
                currency,
            } => format!(
                "stock_prices,market={},symbol={},currency={} price={},volume={}i {}",
                escape_tag(market),
                escape_tag(symbol),
                escape_tag(currency),
                value,
                observation.volume.unwrap_or(0),
                timestamp
            ),
            Instrument::UsdIndex => format!("usd_index value={} {}", value, timestamp),
        }
    }
}

/// 태그 키/값의 쉼표, 등호, 공백을 이스케이프합니다.
fn escape_tag(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Sink for InfluxSink {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn write(&self, observation: &Observation) -> std::result::Result<WriteOutcome, SinkError> {
        if !observation.value.is_finite() {
            return Err(SinkError::InvalidValue(observation.value.to_string()));
        }

        let line = Self::line_protocol(observation);
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(
                reqwest::header::AUTHORIZATION,
                self.authorization.expose_secret(),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(instrument = %observation.instrument, "InfluxDB 기록 완료");
        Ok(WriteOutcome::Written)
    }
}
