//! Market data collector.
//!
//! 업스트림 시세 공급자(Yahoo Finance)에서 환율, 주가지수, 달러 인덱스를 가져와
//! 하나 이상의 저장소(Postgres, InfluxDB)에 기록합니다.
//! - 과거 데이터 백필 (구간 분할 + 재시도)
//! - 주기적 최신 시세 폴링
//! - 설정에서 제거된 상품 데이터 정리

pub mod config;
pub mod error;
pub mod fetcher;
pub mod modules;
pub mod provider;
pub mod shutdown;
pub mod sink;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result, SinkError};
pub use fetcher::{FetchFailure, FetchedQuotes, ProviderFetcher, RetryPolicy};
pub use modules::IngestContext;
pub use provider::{QuoteSource, YahooQuoteSource};
pub use sink::{connect_sinks, InfluxSink, PostgresSink, Sink, SinkWriter, WriteReport};
pub use stats::CollectionStats;
