#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `boxtrack` command-line tool.
//!
//! Runs the normalization pipeline, or a single stage of it, over text
//! read from a file or stdin and prints the result as JSON.

mod input;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use boxtrack_cli_utils::IndicatifProgress;
use boxtrack_normalize::{BoundedAuditLog, Pipeline, PipelineConfig};
use boxtrack_normalize_models::{InputHint, InputMetadata, RawInput};
use boxtrack_reference::ReferenceData;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "boxtrack")]
#[command(about = "Normalize container status reports into canonical events")]
struct Cli {
    /// Scoring config (TOML). Defaults apply for missing keys.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Replacement gazetteer (TOML)
    #[arg(long, global = true)]
    gazetteer: Option<PathBuf>,

    /// Replacement owner-code registry (TOML)
    #[arg(long, global = true)]
    owners: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a single input read from a file or stdin
    Normalize {
        /// Input file (reads stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Format hint: text, json, csv, table, or api
        #[arg(long, value_parser = parse_hint)]
        hint: Option<InputHint>,

        /// Email subject line accompanying the input
        #[arg(long)]
        subject: Option<String>,

        /// Sender address accompanying the input
        #[arg(long)]
        from: Option<String>,
    },
    /// Normalize a JSON array (or JSON lines) of inputs in parallel
    Batch {
        /// Batch file
        #[arg(long)]
        file: PathBuf,
    },
    /// Classify an input without extracting anything
    Detect {
        /// Input file (reads stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Validate a single container number
    CheckId {
        /// Candidate container number
        id: String,
    },
    /// Resolve a place name against the gazetteer
    Locate {
        /// Place name or surrounding text
        text: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = boxtrack_cli_utils::init_logger();
    let cli = Cli::parse();

    let (pipeline, audit) = build_pipeline(
        cli.config.as_deref(),
        cli.gazetteer.as_deref(),
        cli.owners.as_deref(),
    )?;

    match cli.command {
        Commands::Normalize {
            file,
            hint,
            subject,
            from,
        } => {
            let text = input::read_text(file.as_deref())?;
            let mut raw = RawInput::text(text).with_metadata(InputMetadata {
                from_email: from,
                subject,
                ..InputMetadata::default()
            });
            if let Some(hint) = hint {
                raw = raw.with_hint(hint);
            }

            let result = pipeline.process(&raw);
            log::info!(
                "{} items: {} valid, {} partial, {} rejected (confidence {:.2})",
                result.items.len(),
                result.valid_count(),
                result.partial_count(),
                result.rejected_count(),
                result.confidence,
            );
            print_json(&result, cli.compact)?;
        }
        Commands::Batch { file } => {
            let inputs = input::parse_batch(&input::read_text(Some(&file))?)?;
            log::info!("Read {} inputs from {}", inputs.len(), file.display());

            let start = Instant::now();
            let progress = IndicatifProgress::inputs_bar(&multi, "normalize", inputs.len());
            let batch = pipeline.process_batch_with_progress(&inputs, &progress);
            let events: usize = batch.results.iter().map(|r| r.events().count()).sum();
            log::info!(
                "Finished in {:.1}s: {} succeeded, {} partial, {} failed, {events} events",
                start.elapsed().as_secs_f64(),
                batch.summary.succeeded,
                batch.summary.partial,
                batch.summary.failed,
            );

            print_json(&batch, cli.compact)?;
        }
        Commands::Detect { file } => {
            let raw = RawInput::text(input::read_text(file.as_deref())?);
            print_json(&pipeline.detect(&raw), cli.compact)?;
        }
        Commands::CheckId { id } => {
            print_json(&pipeline.check_identifier(&id), cli.compact)?;
        }
        Commands::Locate { text } => {
            print_json(&pipeline.resolve_location(&text), cli.compact)?;
        }
    }

    for entry in audit.entries() {
        log::debug!(
            "audit {} {}: {} items ({} valid, {} partial, {} rejected), confidence {:.2}",
            entry.id,
            entry.format,
            entry.items,
            entry.valid,
            entry.partial,
            entry.rejected,
            entry.confidence,
        );
    }

    Ok(())
}

fn build_pipeline(
    config: Option<&Path>,
    gazetteer: Option<&Path>,
    owners: Option<&Path>,
) -> Result<(Pipeline, Arc<BoundedAuditLog>), Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let reference = ReferenceData::load(gazetteer, owners)?;
    let audit = Arc::new(BoundedAuditLog::new(config.audit_capacity));

    let pipeline = Pipeline::new(Arc::new(reference), config).with_audit(audit.clone());

    Ok((pipeline, audit))
}

fn parse_hint(value: &str) -> Result<InputHint, String> {
    value
        .parse()
        .map_err(|_| format!("unknown hint '{value}' (expected text, json, csv, table, or api)"))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{json}");
    Ok(())
}
