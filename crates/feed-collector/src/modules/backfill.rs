//! 과거 데이터 백필 모듈.
//!
//! 카탈로그 순서(달러 인덱스 → 통화 → 지수)대로 상품마다 구간을 오래된 것부터 조회하여
//! 기록합니다. 한 상품/구간의 실패는 로그만 남기고 다음 작업으로 넘어갑니다.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{error, info, warn};

use super::{observations_from_quotes, IngestContext};
use crate::config::BackfillConfig;
use crate::fetcher::FetchFailure;
use crate::shutdown::sleep_or_cancel;
use crate::stats::CollectionStats;
use feed_core::{CatalogEntry, FetchRequest, Normalizer, Segment, SegmentPlanner};

/// 백필을 실행합니다.
///
/// 종료 신호나 실행 제한 시간으로 중단되면 그때까지의 통계를 반환합니다.
pub async fn run_backfill(
    ctx: &IngestContext,
    config: &BackfillConfig,
    now: DateTime<Utc>,
) -> CollectionStats {
    let started = Instant::now();
    let mut stats = CollectionStats::new();

    let (window_start, window_end) = config.window(now);
    let segments = SegmentPlanner::plan(window_start, window_end, now);
    let entries = ctx.catalog.entries();

    info!(
        start = %window_start,
        end = %window_end,
        segments = segments.len(),
        instruments = entries.len(),
        "백필 시작"
    );

    if segments.is_empty() {
        warn!("백필 구간이 비어 있습니다");
        stats.elapsed = started.elapsed();
        return stats;
    }

    let normalizer = Normalizer::historical();

    for (idx, entry) in entries.iter().enumerate() {
        if ctx.shutdown.is_cancelled() {
            break;
        }
        stats.instruments += 1;

        info!(
            instrument = %entry.instrument,
            progress = format!("{}/{}", idx + 1, entries.len()),
            "상품 백필 시작"
        );

        let pause = match backfill_instrument(ctx, entry, &segments, config, &normalizer, &mut stats).await {
            InstrumentResult::Completed => config.instrument_pause(),
            InstrumentResult::HadFailures => config.error_pause(),
            InstrumentResult::Cancelled => break,
        };

        if idx + 1 < entries.len() && !sleep_or_cancel(pause, &ctx.shutdown).await {
            break;
        }
    }

    if ctx.shutdown.is_cancelled() {
        warn!("백필이 중단되었습니다");
    }

    stats.elapsed = started.elapsed();
    stats
}

enum InstrumentResult {
    Completed,
    HadFailures,
    Cancelled,
}

async fn backfill_instrument(
    ctx: &IngestContext,
    entry: &CatalogEntry,
    segments: &[Segment],
    config: &BackfillConfig,
    normalizer: &Normalizer,
    stats: &mut CollectionStats,
) -> InstrumentResult {
    let mut had_failures = false;

    for (idx, segment) in segments.iter().enumerate() {
        stats.requests += 1;
        let request = FetchRequest::Range {
            start: segment.start,
            end: segment.end,
            granularity: segment.granularity,
        };

        match ctx.fetcher.fetch(&entry.symbols, &request).await {
            Ok(fetched) => {
                let observations =
                    observations_from_quotes(&entry.instrument, &fetched.quotes, normalizer, stats);
                ctx.write_all(&observations, stats).await;
                info!(
                    instrument = %entry.instrument,
                    symbol = %fetched.symbol,
                    segment = %segment,
                    rows = observations.len(),
                    "구간 기록 완료"
                );
            }
            Err(FetchFailure::Cancelled) => return InstrumentResult::Cancelled,
            Err(e) => {
                stats.fetch_failures += 1;
                had_failures = true;
                error!(
                    instrument = %entry.instrument,
                    segment = %segment,
                    error = %e,
                    "구간 조회 실패"
                );
            }
        }

        if idx + 1 < segments.len() && !sleep_or_cancel(config.segment_pause(), &ctx.shutdown).await
        {
            return InstrumentResult::Cancelled;
        }
    }

    if had_failures {
        InstrumentResult::HadFailures
    } else {
        InstrumentResult::Completed
    }
}
