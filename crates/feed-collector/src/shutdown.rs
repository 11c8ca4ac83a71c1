//! 협력적 종료 지원.
//!
//! 모든 대기(백오프, 요청 간 대기, 폴링 주기)는 종료 신호로 즉시 깨어날 수 있습니다.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// `duration`만큼 대기합니다. 종료 신호를 받으면 `false`를 반환합니다.
pub async fn sleep_or_cancel(duration: Duration, shutdown: &CancellationToken) -> bool {
    if shutdown.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Ctrl-C 수신 시 토큰을 취소하는 태스크를 시작합니다.
pub fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 진행 중인 작업을 정리합니다...");
            shutdown.cancel();
        }
    });
}

/// `deadline` 경과 시 토큰을 취소하는 태스크를 시작합니다.
pub fn cancel_after(deadline: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        if sleep_or_cancel(deadline, &shutdown).await {
            tracing::warn!(deadline_secs = deadline.as_secs(), "실행 제한 시간 초과, 작업을 중단합니다");
            shutdown.cancel();
        }
    });
}
