mod commands;
mod logging;
mod progress;

use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use ticket_courier_core::browser::{prepare_window, WebDriverSession, Window};
use ticket_courier_core::config::{load_configuration, LoggingConfig};
use ticket_courier_core::fs::{LocalFs, PendingDocuments};
use ticket_courier_core::pdf::{DocumentEditor, LopdfEditor};
use ticket_courier_core::{AppConfig, BatchEngine, FolderRole, RunSummary};
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let loaded = load_configuration(args.config.as_deref());
    let log_config = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    let _guard = logging::init_logger(&log_config);

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(Commands::Process) => run_process(&config),
        Some(Commands::Redact) => run_redact(&config),
        Some(Commands::Crop {
            input,
            output,
            height,
        }) => LopdfEditor
            .crop_bottom(&input, &output, height)
            .map(|pages| info!("Cropped {} pages into {}", pages, output.display()))
            .with_context(|| format!("Could not crop {}", input.display())),
        Some(Commands::Status) => run_status(&config),
        Some(Commands::PrintConfig) => config
            .to_toml()
            .map(|text| println!("{}", text))
            .context("Could not render configuration"),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    config.paths.validate()?;
    config.redaction.validate()?;
    Ok(())
}

fn run_process(config: &AppConfig) -> anyhow::Result<()> {
    validate(config)?;

    let session = WebDriverSession::start(&config.browser, &config.paths.download)
        .context("Could not start browser session")?;
    let mut session =
        prepare_window(session, &config.browser).context("Could not maximize browser window")?;

    let engine = BatchEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.run(&mut session, &reporter);
    session.quit();

    let summary = result.context("Batch processing stopped")?;
    print_summary(config, &summary);
    Ok(())
}

fn run_redact(config: &AppConfig) -> anyhow::Result<()> {
    validate(config)?;
    let engine = BatchEngine::new(config.clone());
    let summary = engine.redact_only()?;
    info!(
        "{} documents redacted into {}, {} failed",
        format!("{}", summary.redacted.len()).green(),
        config.paths.edited.display(),
        format!("{}", summary.failed.len()).red(),
    );
    for path in &summary.failed {
        warn!("Left in download folder: {}", path.display());
    }
    Ok(())
}

fn run_status(config: &AppConfig) -> anyhow::Result<()> {
    validate(config)?;
    let engine = BatchEngine::new(config.clone());
    let batches = engine.pending_batches()?;

    println!("{} pending batches", format!("{}", batches.len()).cyan());
    for batch in &batches {
        match &batch.interrupted {
            Some(marker) => println!(
                "  {} {} (interrupted while {} at {})",
                "!".yellow(),
                batch.name,
                marker.stage,
                marker.updated_at
            ),
            None => println!("  - {}", batch.name),
        }
    }

    let download = config.paths.resolve(FolderRole::Download);
    let pending = PendingDocuments::scan(&LocalFs, download)?;
    println!(
        "{} documents waiting in {}",
        format!("{}", pending.len()).cyan(),
        download.display()
    );
    Ok(())
}

fn print_summary(config: &AppConfig, summary: &RunSummary) {
    println!();
    for batch in &summary.batches {
        let delivered = batch.reconcile.moved.len();
        info!(
            "{}: {} of {} delivered to {}, archived as {}",
            batch.batch,
            format!("{}", delivered).green(),
            batch.rows,
            batch
                .output_folder
                .as_deref()
                .unwrap_or(config.paths.resolve(FolderRole::Processed))
                .display(),
            batch.archived_as.display(),
        );
        if let Some(report) = &batch.report {
            info!(
                "{} rows not delivered, see {}",
                format!("{}", batch.rows.saturating_sub(delivered)).red(),
                report.display()
            );
        }
    }
    info!(
        "{} batches in {}",
        format!("{}", summary.batches.len()).cyan(),
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
    );
}
