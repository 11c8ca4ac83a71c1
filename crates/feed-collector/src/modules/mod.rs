//! 수집 모듈.
//!
//! - [`backfill`]: 과거 구간 일괄 수집
//! - [`poll`]: 주기적 최신 시세 폴링
//! - [`reconcile`]: 설정에서 제거된 상품 데이터 정리

pub mod backfill;
pub mod poll;
pub mod reconcile;

pub use backfill::run_backfill;
pub use poll::{run_cycle, run_poll_loop};
pub use reconcile::{reconcile, stale_keys};

use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::fetcher::ProviderFetcher;
use crate::sink::SinkWriter;
use crate::stats::CollectionStats;
use feed_core::{derive_usd_index, Instrument, Normalizer, Observation, Quote, SymbolCatalog};

/// 수집 작업에 필요한 협력 객체 묶음.
pub struct IngestContext {
    pub catalog: SymbolCatalog,
    pub fetcher: ProviderFetcher,
    pub writer: SinkWriter,
    pub shutdown: CancellationToken,
}

impl IngestContext {
    pub fn new(
        catalog: SymbolCatalog,
        fetcher: ProviderFetcher,
        writer: SinkWriter,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            writer,
            shutdown,
        }
    }

    /// 정규화된 관측값을 순서대로 기록하고 결과를 통계에 반영합니다.
    pub(crate) async fn write_all(&self, observations: &[Observation], stats: &mut CollectionStats) {
        for observation in observations {
            let report = self.writer.write(observation).await;
            stats.record_write(&report);
        }
    }
}

/// 공급자 샘플을 상품별 관측값으로 변환합니다.
///
/// - 달러 인덱스: EUR/USD 종가에서 파생. 계산할 수 없는 샘플은 건너뜁니다.
/// - 주가지수: 거래량이 없으면 0
/// - 환율: 종가를 그대로 정규화
pub(crate) fn observations_from_quotes(
    instrument: &Instrument,
    quotes: &[Quote],
    normalizer: &Normalizer,
    stats: &mut CollectionStats,
) -> Vec<Observation> {
    let mut observations = Vec::with_capacity(quotes.len());

    for quote in quotes {
        let observation = match instrument {
            Instrument::UsdIndex => match derive_usd_index(quote.close, normalizer) {
                Ok(value) => Observation::new(instrument.clone(), quote.timestamp, value),
                Err(e) => {
                    error!(timestamp = %quote.timestamp, error = %e, "달러 인덱스 계산 실패");
                    stats.skipped += 1;
                    continue;
                }
            },
            Instrument::StockPrice { .. } => Observation::new(
                instrument.clone(),
                quote.timestamp,
                normalizer.normalize(quote.close),
            )
            .with_volume(quote.volume.unwrap_or(0)),
            Instrument::ExchangeRate { .. } => Observation::new(
                instrument.clone(),
                quote.timestamp,
                normalizer.normalize(quote.close),
            ),
        };
        observations.push(observation);
    }

    observations
}
