//! Exam Proctor - Replay Agent
//!
//! Runs one full proctoring session against a recorded detection trace and
//! prints the resulting submission as JSON. A session's score can be
//! reproduced from its event history this way.
//!
//! Reports go to the cloud server when `CLOUD_SERVER_URL` is set, otherwise
//! to an in-memory store.

mod replay;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, Notify};

use proctor_core::constants::{APP_NAME, APP_VERSION};
use proctor_core::logic::cheating_log::CandidateIdentity;
use proctor_core::logic::cloud_sync::{CloudConfig, ProctorCloudClient};
use proctor_core::logic::config::ProctorConfig;
use proctor_core::logic::report::{spawn_flush_loop, InMemoryReportStore, ReportOutbox, ReportPersister, ReportStore};
use proctor_core::logic::session::{SessionManager, FOCUS_BUFFER};
use proctor_core::logic::telemetry;

use replay::{focus_entry_count, load_trace, ReplaySource};

#[derive(Parser)]
#[command(author, version, about = "Replay a recorded detection trace through a proctoring session")]
struct Cli {
    /// JSONL trace: one frame or focus transition per line
    trace: PathBuf,
    /// Exam identifier
    #[arg(long)]
    exam: String,
    /// Candidate name
    #[arg(long)]
    name: String,
    /// Candidate email
    #[arg(long)]
    email: String,
    /// Sampling tick in milliseconds (frame timestamps drive the cooldown)
    #[arg(long, default_value_t = 1)]
    interval_ms: u64,
    /// Do not write the JSONL audit trail
    #[arg(long)]
    no_telemetry: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ProctorConfig::from_env();

    log::info!("Starting {} replay agent v{}...", APP_NAME, APP_VERSION);

    if !cli.no_telemetry {
        if let Err(e) = telemetry::init(config.log_dir.clone()) {
            log::warn!("Telemetry init failed: {} - events will not be recorded", e);
        }
    }

    let entries = load_trace(&cli.trace)?;
    log::info!("Loaded {} trace entries from {:?}", entries.len(), cli.trace);

    let store = build_store(&config).await?;
    let outbox = Arc::new(ReportOutbox::new());
    let flush_loop = spawn_flush_loop(
        outbox.clone(),
        store.clone(),
        Duration::from_secs(config.outbox_interval_secs),
    );
    let persister = ReportPersister::new(store.clone(), outbox.clone(), config.persist_attempts);

    let mut settings = config.session_settings();
    settings.sample_interval = Duration::from_millis(cli.interval_ms.max(1));
    settings.exam_duration = None;

    // Replayed frames carry no image; captures are skipped and audited
    let uploader = config.build_uploader().context("cannot build evidence uploader")?;
    let manager = SessionManager::new(persister, uploader, settings);

    // Sized to the trace so a burst of transitions before a frame is never dropped
    let (focus_tx, focus_rx) = mpsc::channel(focus_entry_count(&entries).max(FOCUS_BUFFER));
    let focus_probe = focus_tx.clone();
    let finished = Arc::new(Notify::new());
    let source = ReplaySource::new(entries, focus_tx, finished.clone());

    let id = manager.start_session(
        &cli.exam,
        CandidateIdentity::new(&cli.name, &cli.email),
        Box::new(source),
        focus_rx,
    )?;

    finished.notified().await;
    // Let the session consume focus transitions still buffered
    while focus_probe.capacity() < focus_probe.max_capacity() {
        tokio::time::sleep(settings.sample_interval).await;
    }

    let submission = manager.submit_session(id).await?;
    manager.release(id).await;

    if !outbox.is_empty() {
        let summary = outbox.flush(store.as_ref()).await;
        if summary.requeued > 0 {
            log::error!("{} report(s) could not be persisted before exit", summary.requeued);
        }
    }
    flush_loop.abort();

    println!("{}", serde_json::to_string_pretty(&submission)?);

    telemetry::shutdown();
    Ok(())
}

async fn build_store(config: &ProctorConfig) -> Result<Arc<dyn ReportStore>> {
    if std::env::var("CLOUD_SERVER_URL").is_err() {
        log::info!("CLOUD_SERVER_URL not set, keeping reports in memory");
        return Ok(Arc::new(InMemoryReportStore::new()));
    }

    let client = ProctorCloudClient::new(CloudConfig {
        server_url: config.cloud_server_url.clone(),
        api_token: config.cloud_api_token.clone(),
        timeout_seconds: config.http_timeout_secs,
    })
    .context("cannot build cloud client")?;

    match client.health_check().await {
        Ok(health) => log::info!("Cloud server healthy: v{}", health.version),
        Err(e) => log::warn!("Cloud server not reachable: {} (reports will be queued)", e),
    }

    Ok(Arc::new(client))
}
