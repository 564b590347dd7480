mod assessments;
mod config;
mod db;
mod decision;
mod errors;
mod events;
mod llm_client;
mod models;
mod notifications;
mod pipeline;
mod repository;
mod resume;
mod routes;
mod screening;
mod state;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::assessments::AssessmentRegistry;
use crate::config::Config;
use crate::db::create_pool;
use crate::events::{run_consumer, RecheckQueue, RedisRecheckQueue};
use crate::llm_client::LlmClient;
use crate::models::PipelineStatus;
use crate::notifications::{LogNotifier, Notifications, Notifier, WebhookNotifier};
use crate::pipeline::locks::PgRunLock;
use crate::pipeline::{OrchestratorSettings, PipelineOrchestrator, RunReport};
use crate::repository::{PgRepository, PipelineRepository};
use crate::resume::{ResumeIntake, S3ResumeStorage};
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "hiring-agent")]
#[command(about = "AI hiring pipeline: screening, assessments and final decisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the assessment re-check consumer
    Serve,

    /// Process active pipelines once, then exit (run from a scheduler)
    Process {
        /// Process only this pipeline; it is still skipped unless active
        #[arg(long)]
        pipeline_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hiring-agent v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url, config.pipeline_workers as u32 + 5).await?;
    let repo = Arc::new(PgRepository::new(db.clone()));

    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_model.clone(),
        config.llm_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Milestone notifications go to {url}");
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => Arc::new(LogNotifier),
    };

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            repo.clone(),
            repo.clone(),
            Arc::new(llm),
            AssessmentRegistry::postgres(&db),
            Notifications::new(notifier),
            OrchestratorSettings {
                site_url: config.site_url.clone(),
                workers: config.pipeline_workers,
            },
        )
        .with_run_lock(Arc::new(PgRunLock::new(db.clone()))),
    );

    match cli.command {
        Commands::Serve => serve(&config, repo, orchestrator).await,
        Commands::Process { pipeline_id } => {
            let ok = process(repo.as_ref(), &orchestrator, pipeline_id).await;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn serve(
    config: &Config,
    repo: Arc<PgRepository>,
    orchestrator: Arc<PipelineOrchestrator>,
) -> Result<()> {
    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let queue: Arc<dyn RecheckQueue> = Arc::new(
        RedisRecheckQueue::connect(&redis)
            .await
            .context("Failed to connect to Redis")?,
    );
    info!("Redis re-check queue connected");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(config).await;
    let storage = Arc::new(S3ResumeStorage::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    tokio::spawn(run_consumer(queue.clone(), orchestrator.clone()));

    let state = AppState {
        repo: repo.clone(),
        action_log: repo.clone(),
        orchestrator,
        recheck_queue: queue,
        intake: Arc::new(ResumeIntake::new(
            repo,
            storage,
            config.max_resume_bytes,
        )),
        // Several resumes per request, each up to the per-file cap
        upload_limit: config.max_resume_bytes.saturating_mul(10),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs each pipeline in turn and prints one summary line per pipeline.
/// Returns false if any pipeline or candidate failed.
async fn process(
    repo: &dyn PipelineRepository,
    orchestrator: &PipelineOrchestrator,
    pipeline_id: Option<Uuid>,
) -> bool {
    let pipelines = match pipeline_id {
        Some(id) => match repo.get_pipeline(id).await {
            Ok(Some(pipeline)) => vec![pipeline],
            Ok(None) => {
                error!("Pipeline {id} not found");
                return false;
            }
            Err(e) => {
                error!("Failed to load pipeline {id}: {e}");
                return false;
            }
        },
        None => match repo.list_pipelines(Some(PipelineStatus::Active)).await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                error!("Failed to load active pipelines: {e}");
                return false;
            }
        },
    };

    let mut ok = true;
    for pipeline in &pipelines {
        match orchestrator.process_pipeline(pipeline).await {
            Ok(RunReport::Completed(stats)) => {
                println!("{}: {}", pipeline.job.title, stats.summary_line());
                if stats.errors > 0 {
                    ok = false;
                }
            }
            Ok(RunReport::Skipped { reason, .. }) => {
                println!("{}: skipped ({reason})", pipeline.job.title);
            }
            Err(e) => {
                error!("Pipeline {} failed: {e}", pipeline.id);
                println!("{}: failed ({e})", pipeline.job.title);
                ok = false;
            }
        }
    }
    info!("Processed {} pipeline(s)", pipelines.len());
    ok
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "hiring-agent-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
