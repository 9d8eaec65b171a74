#![forbid(unsafe_code)]

//! `clip-digest` video-link summarization bot binary.
//!
//! Bootstraps configuration, the knowledge base, the AI pipeline, and the
//! WeCom callback server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use clip_digest::ai::client::{OpenAiCompatClient, WhisperTranscriber};
use clip_digest::ai::{ChatBackend, SpeechToText};
use clip_digest::config::{GlobalConfig, ModelConfig};
use clip_digest::delivery::wecom::WeComClient;
use clip_digest::delivery::Messenger;
use clip_digest::media::FfmpegSegmenter;
use clip_digest::orchestrator::dedup::DedupCache;
use clip_digest::orchestrator::dispatcher::Dispatcher;
use clip_digest::orchestrator::registry::TaskRegistry;
use clip_digest::orchestrator::task_manager::{
    spawn_debounce_consumer, TaskManager, DEBOUNCE_CHANNEL_CAPACITY,
};
use clip_digest::orchestrator::task_runner::{RunnerDeps, SummaryTaskRunner};
use clip_digest::persistence::db;
use clip_digest::persistence::knowledge_repo::KnowledgeRepo;
use clip_digest::pipeline::{
    PipelineBackends, PipelineSettings, StageModel, SummaryPipeline, DEFAULT_CHAT_TIMEOUT,
};
use clip_digest::render::{CommandRenderer, DisabledRenderer, DocumentRenderer};
use clip_digest::video::CommandVideoSource;
use clip_digest::webhook::codec::PlaintextCodec;
use clip_digest::webhook::server::{self, AppState};
use clip_digest::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "clip-digest", about = "Video link summarization bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("clip-digest bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .map_err(|err| AppError::Config(format!("cannot create temp_dir: {err}")))?;

    // ── Initialize knowledge base ───────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    let knowledge = Arc::new(KnowledgeRepo::new(Arc::clone(&db)));
    match knowledge.count().await {
        Ok(entries) => info!(entries, "knowledge base connected"),
        Err(err) => warn!(%err, "knowledge base connected but count failed"),
    }

    // ── Build collaborators ─────────────────────────────
    let messenger: Arc<dyn Messenger> = Arc::new(WeComClient::new(&config.wecom)?);
    let pipeline = Arc::new(build_pipeline(&config)?);

    let tools = &config.tools;
    let source = Arc::new(CommandVideoSource::new(
        &tools.downloader,
        &tools.ffmpeg,
        &config.temp_dir,
    ));
    let renderer: Arc<dyn DocumentRenderer> = if let Some(program) = &tools.pdf_renderer {
        Arc::new(CommandRenderer::new(program, tools.pdf_renderer_args.clone()))
    } else {
        info!("no pdf renderer configured; summaries are sent as markdown");
        Arc::new(DisabledRenderer)
    };

    let runner = SummaryTaskRunner::new(
        RunnerDeps {
            source,
            pipeline,
            store: knowledge,
            renderer,
            messenger: Arc::clone(&messenger),
        },
        &config.temp_dir,
        config.pipeline.notify_progress,
    );

    // ── Task orchestration ──────────────────────────────
    let ct = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(DEBOUNCE_CHANNEL_CAPACITY);
    let tasks = TaskManager::new(
        Arc::new(TaskRegistry::new()),
        messenger,
        Arc::new(runner),
        config.debounce_window(),
        event_tx,
    );
    let consumer = spawn_debounce_consumer(tasks.clone(), event_rx, ct.clone());
    let dispatcher = Dispatcher::new(Arc::new(DedupCache::new(config.dedup_ttl())), tasks);

    // ── Start HTTP server ───────────────────────────────
    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .map_err(|err| AppError::Config(format!("invalid bind address: {err}")))?;
    let state = AppState {
        dispatcher,
        codec: Arc::new(PlaintextCodec),
    };
    let server_ct = ct.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(state, addr, server_ct).await {
            error!(%err, "webhook server failed");
        }
    });

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(server_handle, consumer);
    db.close().await;
    info!("clip-digest shut down");

    Ok(())
}

fn stage_model(config: &GlobalConfig, stage: &str, model: &ModelConfig) -> Result<StageModel> {
    let client = OpenAiCompatClient::new(&config.ai.api_base, &model.api_key, stage)?;
    let backend: Arc<dyn ChatBackend> = Arc::new(client);
    Ok(StageModel::new(backend, &model.model))
}

fn build_pipeline(config: &GlobalConfig) -> Result<SummaryPipeline> {
    let ai = &config.ai;
    let speech_client =
        OpenAiCompatClient::new(&ai.api_base, &ai.transcription.api_key, "speech")?;
    let speech: Arc<dyn SpeechToText> = Arc::new(WhisperTranscriber::new(
        speech_client,
        ai.speech_model.clone(),
        ai.speech_language.clone(),
        DEFAULT_CHAT_TIMEOUT,
    ));

    let backends = PipelineBackends {
        transcription: stage_model(config, "transcription", &ai.transcription)?,
        review: stage_model(config, "review", &ai.review)?,
        enrichment: stage_model(config, "enrichment", &ai.enrichment)?,
        speech,
    };
    let segmenter = Arc::new(FfmpegSegmenter::new(&config.tools.ffmpeg, &config.tools.ffprobe));
    info!(
        segment_secs = config.pipeline.segment_seconds,
        inline_limit = config.pipeline.inline_audio_limit_bytes,
        "pipeline configured"
    );
    Ok(SummaryPipeline::new(
        backends,
        segmenter,
        PipelineSettings::from(&config.pipeline),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
