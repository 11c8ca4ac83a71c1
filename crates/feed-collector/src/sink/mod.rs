//! 관측값 저장소.
//!
//! 각 싱크는 독립적으로 활성화되며, [`SinkWriter`]가 활성화된 모든 싱크에
//! 관측값을 전달하고 싱크별 결과를 [`WriteReport`]로 모읍니다.

mod influx;
mod postgres;
mod writer;

pub use influx::InfluxSink;
pub use postgres::{PostgresSink, PruneReport};
pub use writer::SinkWriter;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::Result;
use feed_core::{Observation, WriteOutcome};

/// 설정에서 활성화된 싱크를 순서대로(Postgres → InfluxDB) 생성합니다.
///
/// 연결 실패는 시작 단계의 치명적 에러입니다.
pub async fn connect_sinks(config: &SinkConfig) -> Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if let Some(postgres) = &config.postgres {
        sinks.push(Arc::new(PostgresSink::connect(postgres).await?));
    }
    if let Some(influx) = &config.influx {
        sinks.push(Arc::new(InfluxSink::new(influx)?));
    }

    tracing::info!(
        sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "저장소 준비 완료"
    );
    Ok(sinks)
}

/// 관측값 저장소 인터페이스.
#[async_trait]
pub trait Sink: Send + Sync {
    /// 로그에 사용할 싱크 이름.
    fn name(&self) -> &str;

    /// 관측값 하나를 기록합니다.
    ///
    /// 이미 존재하는 관측값이면 `DuplicateSkipped`를 반환해야 하며 에러가 아닙니다.
    async fn write(&self, observation: &Observation) -> std::result::Result<WriteOutcome, SinkError>;

    /// 재시도 사이에 연결 복구를 시도하는지 여부.
    fn supports_reconnect(&self) -> bool {
        false
    }

    /// 연결을 복구합니다.
    async fn reconnect(&self) -> std::result::Result<(), SinkError> {
        Ok(())
    }

    /// 보유한 자원을 정리합니다.
    async fn close(&self) {}
}

/// 싱크 하나의 기록 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkOutcome {
    pub sink: String,
    pub outcome: WriteOutcome,
}

/// 관측값 하나를 모든 싱크에 기록한 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    outcomes: Vec<SinkOutcome>,
}

impl WriteReport {
    pub fn new(outcomes: Vec<SinkOutcome>) -> Self {
        Self { outcomes }
    }

    /// 하나 이상의 싱크가 관측값을 보유하게 되었는지 여부.
    ///
    /// 싱크가 하나도 없으면 실패로 봅니다.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_success())
    }

    /// 실패한 싱크가 하나라도 있는지 여부.
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.outcome.is_success())
    }

    pub fn outcomes(&self) -> impl Iterator<Item = WriteOutcome> + '_ {
        self.outcomes.iter().map(|o| o.outcome)
    }

    /// 이름으로 싱크 결과를 조회합니다.
    pub fn outcome_for(&self, sink: &str) -> Option<WriteOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.sink == sink)
            .map(|o| o.outcome)
    }
}
