//! 최신 시세 폴링 모듈.
//!
//! 사이클마다 달러 인덱스 → 통화 → 지수 순서로 최신 샘플 하나를 조회하여 기록하고,
//! 주기만큼 대기합니다. 종료 신호는 대기 중에 감지합니다.

use std::time::Instant;
use tracing::{error, info, warn};

use super::{observations_from_quotes, IngestContext};
use crate::config::{CycleFailurePolicy, PollConfig};
use crate::error::CollectorError;
use crate::fetcher::FetchFailure;
use crate::shutdown::sleep_or_cancel;
use crate::stats::CollectionStats;
use crate::Result;
use feed_core::{FetchRequest, Instrument, Normalizer};

/// 폴링 사이클 한 번을 실행합니다.
pub async fn run_cycle(ctx: &IngestContext, config: &PollConfig) -> CollectionStats {
    let started = Instant::now();
    let mut stats = CollectionStats::new();
    let normalizer = Normalizer::live();
    let request = FetchRequest::latest();

    for entry in ctx.catalog.entries() {
        stats.instruments += 1;
        stats.requests += 1;

        match ctx.fetcher.fetch(&entry.symbols, &request).await {
            Ok(fetched) => {
                let latest: Vec<_> = fetched.quotes.last().copied().into_iter().collect();
                let observations =
                    observations_from_quotes(&entry.instrument, &latest, &normalizer, &mut stats);
                ctx.write_all(&observations, &mut stats).await;
                for observation in &observations {
                    info!(
                        instrument = %observation.instrument,
                        symbol = %fetched.symbol,
                        value = observation.value,
                        timestamp = %observation.timestamp,
                        "최신 시세 기록"
                    );
                }
            }
            Err(FetchFailure::Cancelled) => break,
            Err(e) => {
                stats.fetch_failures += 1;
                error!(instrument = %entry.instrument, error = %e, "최신 시세 조회 실패");
            }
        }

        if !matches!(entry.instrument, Instrument::UsdIndex)
            && !sleep_or_cancel(config.request_pause(), &ctx.shutdown).await
        {
            break;
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

/// 종료 신호를 받을 때까지 폴링 사이클을 반복합니다.
///
/// 관측값이 있었는데 모든 기록이 모든 싱크에서 실패한 사이클은 복구 불가로 간주합니다.
/// 사이클 도중 종료 신호를 받았다면 실패 정책을 적용하지 않고 정상 종료합니다.
/// - `Restart`: 싱크 재연결 후 다음 사이클 계속
/// - `Exit`: 싱크 정리 후 [`CollectorError::CycleFailed`] 반환
pub async fn run_poll_loop(ctx: &IngestContext, config: &PollConfig) -> Result<CollectionStats> {
    let started = Instant::now();
    let mut total = CollectionStats::new();
    let mut cycle: u64 = 0;

    info!(
        interval_secs = config.interval_secs,
        policy = ?config.failure_policy,
        sinks = ?ctx.writer.sink_names(),
        "폴링 시작"
    );

    loop {
        cycle += 1;
        info!(cycle = cycle, "=== 폴링 사이클 시작 ===");

        let stats = run_cycle(ctx, config).await;
        stats.log_summary("폴링 사이클");
        total.merge(&stats);

        // 종료 신호로 중단된 기록 실패는 사이클 실패로 보지 않음
        if ctx.shutdown.is_cancelled() {
            info!(cycles = cycle, "종료 신호 수신, 폴링 종료");
            break;
        }

        if stats.all_writes_failed() {
            error!(cycle = cycle, failed = stats.failed, "사이클의 모든 기록 실패");
            match config.failure_policy {
                CycleFailurePolicy::Exit => {
                    ctx.writer.close().await;
                    return Err(CollectorError::CycleFailed { cycle });
                }
                CycleFailurePolicy::Restart => {
                    let failed = ctx.writer.reconnect_all().await;
                    warn!(cycle = cycle, failed_sinks = failed, "저장소 재연결 후 계속합니다");
                }
            }
        }

        if !sleep_or_cancel(config.interval(), &ctx.shutdown).await {
            info!(cycles = cycle, "종료 신호 수신, 폴링 종료");
            break;
        }
    }

    total.elapsed = started.elapsed();
    Ok(total)
}
