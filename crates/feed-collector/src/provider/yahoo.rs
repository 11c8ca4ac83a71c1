//! Yahoo Finance 시세 공급자.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api::YahooConnector;

use super::QuoteSource;
use crate::error::CollectorError;
use crate::Result;
use feed_core::{FetchRequest, Quote};

/// Yahoo Finance 기반 시세 공급자.
pub struct YahooQuoteSource {
    connector: YahooConnector,
}

impl YahooQuoteSource {
    pub fn new() -> Result<Self> {
        let connector = YahooConnector::new()
            .map_err(|e| CollectorError::Provider(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_quotes(&self, symbol: &str, request: &FetchRequest) -> Result<Vec<Quote>> {
        let response = match *request {
            FetchRequest::Range {
                start,
                end,
                granularity,
            } => {
                debug!(
                    symbol = symbol,
                    interval = granularity.to_yahoo_interval(),
                    start = %start,
                    end = %end,
                    "Yahoo Finance API 날짜 범위 호출"
                );
                self.connector
                    .get_quote_history_interval(
                        symbol,
                        to_offset_datetime(start)?,
                        to_offset_datetime(end)?,
                        granularity.to_yahoo_interval(),
                    )
                    .await
            }
            FetchRequest::Latest {
                lookback,
                granularity,
            } => {
                debug!(
                    symbol = symbol,
                    interval = granularity.to_yahoo_interval(),
                    range = lookback.to_yahoo_range(),
                    "Yahoo Finance API 최신 시세 호출"
                );
                self.connector
                    .get_quote_range(
                        symbol,
                        granularity.to_yahoo_interval(),
                        lookback.to_yahoo_range(),
                    )
                    .await
            }
        }
        .map_err(|e| CollectorError::Provider(format!("Yahoo Finance API 오류 ({}): {}", symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| CollectorError::Provider(format!("Quote 파싱 오류 ({}): {}", symbol, e)))?;

        let mut rows: Vec<Quote> = quotes
            .iter()
            .filter(|q| q.close.is_finite())
            .filter_map(|q| {
                let timestamp = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                Some(Quote::new(timestamp, q.close).with_volume(q.volume as u64))
            })
            .collect();
        rows.sort_by_key(|q| q.timestamp);

        if matches!(request, FetchRequest::Latest { .. }) {
            rows = rows.pop().into_iter().collect();
        }

        Ok(rows)
    }
}

fn to_offset_datetime(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| CollectorError::Provider(format!("시각 변환 실패 ({}): {}", dt, e)))
}
