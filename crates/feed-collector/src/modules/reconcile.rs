//! 설정 동기화 모듈.
//!
//! 관계형 저장소에 남아 있지만 더 이상 설정에 없는 통화/지수의 행을 삭제합니다.
//! 수집과는 독립적으로 실행됩니다.

use std::collections::BTreeSet;
use std::time::Instant;
use tracing::info;

use crate::sink::{PostgresSink, PruneReport};
use crate::Result;
use feed_core::SymbolCatalog;

/// 저장소에 존재하지만 설정에 없는 키 (정렬, 중복 제거).
pub fn stale_keys<T>(present: impl IntoIterator<Item = T>, configured: &BTreeSet<T>) -> Vec<T>
where
    T: Ord,
{
    present
        .into_iter()
        .filter(|key| !configured.contains(key))
        .collect::<BTreeSet<T>>()
        .into_iter()
        .collect()
}

/// 미설정 상품 데이터를 정리합니다.
pub async fn reconcile(sink: &PostgresSink, catalog: &SymbolCatalog) -> Result<PruneReport> {
    let started = Instant::now();
    let currencies = catalog.configured_currencies();
    let stocks = catalog.configured_stocks();

    info!(
        currencies = currencies.len(),
        stocks = stocks.len(),
        "설정 동기화 시작"
    );

    let report = sink.prune_unconfigured(&currencies, &stocks).await?;

    if report.is_empty() {
        info!("정리할 데이터가 없습니다");
    } else {
        info!(
            currencies = ?report.currencies,
            stocks = ?report.stocks,
            exchange_rate_rows = report.exchange_rate_rows,
            stock_price_rows = report.stock_price_rows,
            elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
            "설정 동기화 완료"
        );
    }

    Ok(report)
}
