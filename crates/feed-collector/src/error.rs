//! 에러 타입 정의.

use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러 (시작 시 치명적, 재시도하지 않음)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 마이그레이션 에러
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// 시세 공급자 에러 (네트워크, 파싱 등)
    #[error("Provider error: {0}")]
    Provider(String),

    /// HTTP 클라이언트 에러
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 싱크 기록 에러
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// 폴링 사이클 전체 실패
    #[error("Poll cycle {cycle} failed: every write was rejected by every sink")]
    CycleFailed { cycle: u64 },
}

/// 싱크 기록 에러.
#[derive(Debug, Error)]
pub enum SinkError {
    /// 관계형 저장소 에러
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP 전송 에러
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// 저장소가 요청을 거부함
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 저장소 형식으로 변환할 수 없는 값
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// 저장소 사용 불가
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
