//! Loader binary.
//!
//! Thin wrapper around the `batch_saver` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use batch_saver::initialization::init_logger_with;
use batch_saver::{run_import, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    match run_import(opt).await {
        Ok(report) => {
            println!(
                "✅ Loaded {} record{} from {} into {} ({} skipped, {} rows written in {} batch{}) in {:.1}s",
                report.import.saved,
                if report.import.saved == 1 { "" } else { "s" },
                report.file.display(),
                report.table,
                report.import.skipped,
                report.stats.flushed_rows,
                report.stats.flushed_batches,
                if report.stats.flushed_batches == 1 { "" } else { "es" },
                report.elapsed_seconds
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("batch_saver error: {:#}", e);
            process::exit(1);
        }
    }
}
