mod args;

use anyhow::Context;
use common::cancel::CancellationToken;
use common::log_setup::{setup_logging, LogSettings};
use fuzzer::config::FuzzConfig;
use fuzzer::controller::{FuzzController, SessionSummary};
use fuzzer::detection::backend::DetectionBackend;
use fuzzer::error::FuzzError;
use fuzzer::store::{MemoryStore, ResultStore, SqliteStore};

use crate::args::{Args, Operation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_normalized(std::env::args());
    setup_logging(&LogSettings::new(args.log_level.as_str()).with_dir(&args.log_dir))?;

    let config = args.to_config();
    config.validate()?;
    match args.operation {
        Operation::FuzzFeatureDetectors => {}
    }

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current batch");
                cancellation.cancel();
            }
        }
    });

    let in_memory = args.in_memory_database();
    let summary = tokio::task::spawn_blocking(move || fuzz(config, in_memory, cancellation))
        .await
        .context("fuzzing worker panicked")??;

    tracing::info!(
        "Session {} finished: {} images, {} results, {} failed detections, {} aborted sweeps",
        summary.session_id,
        summary.images_processed,
        summary.records_committed,
        summary.failed_detections(),
        summary.aborted_families()
    );

    Ok(())
}

#[cfg(feature = "opencv")]
fn fuzz(
    config: FuzzConfig,
    in_memory: bool,
    cancellation: CancellationToken,
) -> anyhow::Result<SessionSummary> {
    let backend = fuzzer::detection::opencv::OpenCvBackend::default();
    fuzz_with_backend(config, backend, in_memory, cancellation)
}

#[cfg(not(feature = "opencv"))]
fn fuzz(
    _config: FuzzConfig,
    _in_memory: bool,
    _cancellation: CancellationToken,
) -> anyhow::Result<SessionSummary> {
    Err(FuzzError::Configuration(
        "no detection backend was compiled in; rebuild with `--features opencv`".to_string(),
    )
    .into())
}

fn fuzz_with_backend<B: DetectionBackend>(
    config: FuzzConfig,
    backend: B,
    in_memory: bool,
    cancellation: CancellationToken,
) -> anyhow::Result<SessionSummary> {
    if in_memory {
        return run_controller(config, backend, MemoryStore::new(), cancellation);
    }

    let database = config.database_path();
    if let Some(parent) = database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = SqliteStore::open(&database)
        .with_context(|| format!("failed to open result database {}", database.display()))?;

    run_controller(config, backend, store, cancellation)
}

fn run_controller<B: DetectionBackend, S: ResultStore>(
    config: FuzzConfig,
    backend: B,
    store: S,
    cancellation: CancellationToken,
) -> anyhow::Result<SessionSummary> {
    let mut controller = FuzzController::new(config, backend, store)?.with_cancellation(cancellation);

    match controller.run() {
        Ok(summary) => Ok(summary),
        Err(FuzzError::Cancelled) => {
            let session = controller.session();
            tracing::warn!(
                "Session {} cancelled with {} results recorded; it stays without end time",
                session.id,
                session.results.len()
            );
            Err(FuzzError::Cancelled.into())
        }
        Err(err) => Err(err.into()),
    }
}
