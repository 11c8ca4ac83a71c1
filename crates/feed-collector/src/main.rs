//! Market data collector CLI.

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use feed_collector::{
    connect_sinks, modules, shutdown, CollectorConfig, IngestContext, PostgresSink,
    ProviderFetcher, SinkWriter, YahooQuoteSource,
};
use feed_core::{init_logging, LogConfig, LogFormat};

#[derive(Parser)]
#[command(name = "feed-collector")]
#[command(about = "Market data collector (FX, indices, USD index)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact). 없으면 LOG_FORMAT 환경변수 사용
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 과거 데이터 백필 (일회성)
    Backfill {
        /// 시작 날짜 (YYYY-MM-DD). 없으면 HISTORY_START_DATE
        #[arg(long)]
        start: Option<NaiveDate>,

        /// 종료 날짜 (YYYY-MM-DD, 당일 포함). 없으면 현재 시각까지
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// 최신 시세 주기 폴링 (Ctrl-C까지)
    Poll,

    /// 설정에서 제거된 상품 데이터 정리
    Sync,

    /// 관계형 저장소 스키마 적용
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_format = cli
        .log_format
        .or_else(|| std::env::var("LOG_FORMAT").ok()?.parse().ok())
        .unwrap_or_default();
    init_logging(LogConfig::new(cli.log_level.as_str()).with_format(log_format))
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Feed Collector 시작");

    let mut config = CollectorConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Backfill { start, end } => {
            if let Some(start) = start {
                config.backfill.start_date = start;
            }
            if end.is_some() {
                config.backfill.end_date = end;
            }
            config.validate()?;

            let cancel = CancellationToken::new();
            shutdown::cancel_on_ctrl_c(cancel.clone());
            if let Some(deadline) = config.backfill.deadline() {
                shutdown::cancel_after(deadline, cancel.clone());
            }

            let ctx = build_context(&config, cancel).await?;
            let stats = modules::run_backfill(&ctx, &config.backfill, Utc::now()).await;
            stats.log_summary("백필");
            ctx.writer.close().await;
        }
        Commands::Poll => {
            let cancel = CancellationToken::new();
            shutdown::cancel_on_ctrl_c(cancel.clone());

            let ctx = build_context(&config, cancel).await?;
            let result = modules::run_poll_loop(&ctx, &config.poll).await;
            ctx.writer.close().await;

            let stats = result?;
            stats.log_summary("폴링");
        }
        Commands::Sync => {
            let sink = connect_postgres(&config).await?;
            let report = modules::reconcile(&sink, &config.instruments.catalog()).await;
            sink.pool().close().await;
            report?;
        }
        Commands::Migrate => {
            let sink = connect_postgres(&config).await?;
            let result = sink.migrate().await;
            sink.pool().close().await;
            result?;
        }
    }

    tracing::info!("Feed Collector 종료");
    Ok(())
}

async fn build_context(
    config: &CollectorConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<IngestContext> {
    let source = YahooQuoteSource::new()?;
    let fetcher = ProviderFetcher::new(
        Arc::new(source),
        config.fetch.retry_policy(),
        config.fetch.timeout(),
        shutdown.clone(),
    );

    let sinks = connect_sinks(&config.sinks).await?;
    let writer = SinkWriter::new(sinks, config.sinks.retry_policy(), shutdown.clone());

    Ok(IngestContext::new(
        config.instruments.catalog(),
        fetcher,
        writer,
        shutdown,
    ))
}

async fn connect_postgres(config: &CollectorConfig) -> anyhow::Result<PostgresSink> {
    let Some(postgres) = &config.sinks.postgres else {
        bail!("이 명령은 Postgres가 필요합니다 (POSTGRES_ENABLED=true, DATABASE_URL)");
    };
    Ok(PostgresSink::connect(postgres).await?)
}
