//! `transcriber <audio-file>...`
//!
//! Submits each file, waits until every job is terminal, prints one JSON
//! status line per job and drains the pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use api::{AppConfig, Gateway, GatewayError, JobId, PoolEvent, StatusResponse, Upload, init_transcriber};
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast;

/// Exit code when the worker pool hit an unrecoverable fault.
const EXIT_POOL_FATAL: u8 = 70;

#[derive(Parser, Debug)]
#[command(author, version, about = "Transcribe audio files with a pool of recognizer workers", long_about = None)]
struct Args {
    /// Audio files to transcribe.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// How often job statuses are checked.
    #[arg(long, env = "STATUS_POLL_MS", default_value = "200")]
    poll_ms: u64,
}

#[derive(Serialize)]
struct StatusLine<'a> {
    file: String,
    #[serde(flatten)]
    response: &'a StatusResponse,
}

#[derive(Serialize)]
struct RejectedLine {
    file: String,
    error: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway = match init_transcriber(config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut events = gateway.subscribe();
    let outcome = tokio::select! {
        outcome = run(&gateway, &args) => outcome,
        reason = wait_for_fatal(&mut events) => {
            tracing::error!("Worker pool failed: {}", reason);
            return ExitCode::from(EXIT_POOL_FATAL);
        }
    };

    if let Err(e) = gateway.shutdown().await {
        tracing::error!("Shutdown failed: {}", e);
        return ExitCode::from(EXIT_POOL_FATAL);
    }

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Submit every file and print statuses as jobs finish.
///
/// Returns whether every file was transcribed.
async fn run(gateway: &Gateway, args: &Args) -> Result<bool, GatewayError> {
    let mut all_completed = true;
    let mut waiting: HashMap<JobId, String> = HashMap::new();

    for path in &args.files {
        let file = path.display().to_string();
        match submit(gateway, path).await {
            Ok(id) => {
                tracing::info!("{} -> {}", file, id);
                waiting.insert(id, file);
            }
            Err(error) => {
                all_completed = false;
                print_line(&RejectedLine { file, error });
            }
        }
    }

    let interval = Duration::from_millis(args.poll_ms.max(1));
    while !waiting.is_empty() {
        tokio::time::sleep(interval).await;

        let mut finished = Vec::new();
        for (id, file) in &waiting {
            let response = gateway.get_status(&id.to_string()).await?;
            if response.status.is_terminal() {
                all_completed &= response.status.as_str() == "completed";
                print_line(&StatusLine {
                    file: file.clone(),
                    response: &response,
                });
                finished.push(*id);
            }
        }
        for id in finished {
            waiting.remove(&id);
        }
    }

    Ok(all_completed)
}

async fn submit(gateway: &Gateway, path: &Path) -> Result<JobId, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read file: {}", e))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    gateway
        .submit_job(Upload::file(filename, bytes))
        .await
        .map_err(|e| e.to_string())
}

async fn wait_for_fatal(events: &mut broadcast::Receiver<PoolEvent>) -> String {
    loop {
        match events.recv().await {
            Ok(event) if event.is_fatal() => return event.description(),
            Ok(event) => tracing::debug!("{}", event.description()),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} pool events", skipped);
            }
            // The pool is gone; nothing fatal can arrive any more.
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

fn print_line<T: Serialize>(line: &T) {
    match serde_json::to_string(line) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!("Failed to serialize status line: {}", e),
    }
}
