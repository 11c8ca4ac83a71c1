//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sink::WriteReport;
use feed_core::WriteOutcome;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 상품 수
    pub instruments: usize,
    /// 조회 요청 수 (백필: 구간 수, 폴링: 상품 수)
    pub requests: usize,
    /// 재시도 후에도 데이터를 얻지 못한 요청 수
    pub fetch_failures: usize,
    /// 파생 값 계산 실패 등으로 건너뛴 샘플 수
    pub skipped: usize,
    /// 싱크에 전달한 관측값 수
    pub observations: usize,
    /// 하나 이상의 싱크에 새로 기록된 관측값 수
    pub written: usize,
    /// 모든 성공 싱크에서 중복으로 건너뛴 관측값 수
    pub duplicates: usize,
    /// 일부 싱크만 실패한 관측값 수
    pub partial_failures: usize,
    /// 모든 싱크에서 실패한 관측값 수
    pub failed: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 관측값 하나의 기록 결과 반영
    pub fn record_write(&mut self, report: &WriteReport) {
        self.observations += 1;

        if !report.is_success() {
            self.failed += 1;
            return;
        }
        if report.has_failures() {
            self.partial_failures += 1;
        }
        if report.outcomes().any(|o| o == WriteOutcome::Written) {
            self.written += 1;
        } else {
            self.duplicates += 1;
        }
    }

    /// 다른 통계 합산
    pub fn merge(&mut self, other: &CollectionStats) {
        self.instruments += other.instruments;
        self.requests += other.requests;
        self.fetch_failures += other.fetch_failures;
        self.skipped += other.skipped;
        self.observations += other.observations;
        self.written += other.written;
        self.duplicates += other.duplicates;
        self.partial_failures += other.partial_failures;
        self.failed += other.failed;
    }

    /// 기록 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.observations == 0 {
            0.0
        } else {
            ((self.observations - self.failed) as f64 / self.observations as f64) * 100.0
        }
    }

    /// 관측값이 있었지만 전부 모든 싱크에서 실패했는지 여부
    pub fn all_writes_failed(&self) -> bool {
        self.observations > 0 && self.failed == self.observations
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            instruments = self.instruments,
            requests = self.requests,
            fetch_failures = self.fetch_failures,
            skipped = self.skipped,
            observations = self.observations,
            written = self.written,
            duplicates = self.duplicates,
            partial_failures = self.partial_failures,
            failed = self.failed,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
