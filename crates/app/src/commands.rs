use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tillroll_core::{ScannerConfig, ValidatedConfig};
use tillroll_docai::{
    spawn_intake_watcher, DocumentAiClient, ExtractionService, ReceiptPipeline, ScanError,
    ScanOutcome, ServiceError,
};
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::display;

/// `~/.config/tillroll/tillroll.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "tillroll", "tillroll")
        .map(|dirs| dirs.config_dir().join("tillroll.toml"))
}

/// Config file values, overridden by flags and environment variables.
pub fn resolve_config(cli: &Cli) -> Result<ScannerConfig> {
    let mut config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            ScannerConfig::load(&path)?
        }
        None => ScannerConfig::default(),
    };

    if let Some(v) = &cli.project_id {
        config.project_id = Some(v.clone());
    }
    if let Some(v) = &cli.location {
        config.location = v.clone();
    }
    if let Some(v) = &cli.processor_id {
        config.processor_id = Some(v.clone());
    }
    if let Some(v) = &cli.credentials {
        config.credentials_path = Some(v.clone());
    }
    if let Some(v) = &cli.access_token {
        config.access_token = Some(v.clone());
    }
    if cli.images_only {
        config.accept_pdf = false;
    }
    Ok(config)
}

/// One-line hint separating setup problems from passing service trouble.
pub fn diagnose(err: &ScanError) -> &'static str {
    match err {
        ScanError::Configuration(_) => "set the missing values in the config file, flags or TILLROLL_* variables",
        ScanError::Credentials(_) => "check the service account key file",
        ScanError::UnsupportedFileType { .. } => "upload a JPG, PNG, TIFF or PDF file",
        ScanError::Io { .. } => "check the file path and permissions",
        ScanError::Service(ServiceError::Credentials(_))
        | ScanError::Service(ServiceError::Status { status: 401 | 403, .. }) => {
            "check that the service account has the Document AI API User role"
        }
        ScanError::Service(ServiceError::Status { status: 404, .. }) => {
            "check the project id, location and processor id"
        }
        ScanError::Service(e) if e.is_transient() => "the service may be temporarily unavailable; try again",
        ScanError::Service(_) => "check the processor configuration and service account permissions",
    }
}

fn print_outcome(outcome: &ScanOutcome, json: bool, raw: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.record)?);
    } else {
        print!("{}", display::render_outcome(outcome, raw)?);
    }
    Ok(())
}

async fn scan_one<S: ExtractionService>(
    pipeline: &ReceiptPipeline<S>,
    path: &Path,
    json: bool,
    raw: bool,
) -> Result<()> {
    match pipeline.process_file(path).await {
        Ok(outcome) => print_outcome(&outcome, json, raw),
        Err(e) => {
            let hint = diagnose(&e);
            Err(anyhow::Error::new(e).context(format!("Failed to process {} ({hint})", path.display())))
        }
    }
}

pub async fn cmd_scan(config: ScannerConfig, files: &[PathBuf], json: bool, raw: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let mut failures = 0usize;
    for path in files {
        if let Err(e) = scan_one(&pipeline, path, json, raw).await {
            failures += 1;
            eprintln!("error: {e:#}");
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) failed", files.len());
    }
    Ok(())
}

pub async fn cmd_watch(config: ScannerConfig, dir: &Path, json: bool, settle: Duration) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(dir, settle, tx).context("Failed to start intake folder watcher")?;
    tracing::info!("Watching intake folder: {}", dir.display());

    loop {
        tokio::select! {
            maybe_path = rx.recv() => {
                let Some(path) = maybe_path else { break };
                if let Err(e) = scan_one(&pipeline, &path, json, false).await {
                    tracing::warn!("{e:#}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping intake watcher");
                break;
            }
        }
    }
    Ok(())
}

pub fn cmd_check(config: ScannerConfig) -> Result<()> {
    let validated: ValidatedConfig = config.clone().validate().map_err(ScanError::from).map_err(|e| {
        let hint = diagnose(&e);
        anyhow::Error::new(e).context(hint)
    })?;
    println!("Processor:    {}", validated.processor);
    println!("Endpoint:     {}", tillroll_docai::process_url(&validated.base_url(), &validated.processor));
    println!("Credentials:  {:?}", validated.credentials);
    println!("Accept PDF:   {}", validated.accept_pdf);
    println!("Timeout:      {}s", validated.timeout_secs);
    build_pipeline(config)?;
    println!("Configuration OK");
    Ok(())
}

fn build_pipeline(config: ScannerConfig) -> Result<ReceiptPipeline<DocumentAiClient>> {
    ReceiptPipeline::<DocumentAiClient>::from_config(config).map_err(|e| {
        let hint = diagnose(&e);
        anyhow::Error::new(e).context(format!("Cannot start ({hint})"))
    })
}
