mod args;
mod input;
mod output;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use mailprobe::{BatchReport, BatchRunner, CancelFlag, EmailValidator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::input::CsvRow;
use crate::output::OutputPaths;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("input file: {}", cli.input.display());
    info!("output base: {}", cli.output.display());
    info!("delay between checks: {:.1}s", cli.delay.as_secs_f64());

    let input = input::read_input(&cli.input)?;
    info!(rows = input.rows.len(), "processing emails");

    let validator = EmailValidator::system(cli.validator_options(), cli.probe_options())
        .context("initialise DNS resolver")?;

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        if on_signal.is_cancelled() {
            std::process::exit(130);
        }
        warn!("interrupted, finishing current address (press Ctrl-C again to abort)");
        on_signal.cancel();
    })
    .context("install Ctrl-C handler")?;

    let runner = BatchRunner::new(validator, cli.batch_options()).with_cancel_flag(cancel);
    let report = runner.run(input.rows);
    if report.was_cancelled() {
        warn!(completed = report.len(), "run interrupted, writing partial results");
    }

    let paths = OutputPaths::from_base(&cli.output);
    output::write_reports(&report, &input.headers, &paths)?;
    if cli.ndjson {
        output::write_ndjson(&report, io::stdout().lock())?;
    }

    log_summary(&report);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn log_summary(report: &BatchReport<CsvRow>) {
    let total = report.len();
    if total == 0 {
        warn!("no emails were processed");
        return;
    }
    let pct = |n: usize| n as f64 * 100.0 / total as f64;
    let valid = report.valid_count();
    let invalid = report.invalid_count();
    info!("total emails processed: {total}");
    info!("valid emails: {valid} ({:.1}%)", pct(valid));
    info!("invalid emails: {invalid} ({:.1}%)", pct(invalid));
}
