//! The `report` command: report newline-delimited event bodies offline.
//!
//! Each non-blank input line is treated as one raw event and goes through
//! the same reporter as `listen`, so a captured stream can be replayed
//! without a broker.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::error::{LaekningError, Result};
use crate::report::{ReportStats, Reporter};

/// Report every non-blank line of `reader`.
///
/// # Errors
///
/// Returns error if reading the input or writing a sink fails. Lines that do
/// not decode are reported as diagnostics and do not fail the command.
pub fn report_lines<R, O, E>(reader: R, reporter: &mut Reporter<O, E>) -> Result<ReportStats>
where
    R: BufRead,
    O: Write,
    E: Write,
{
    for line in reader.split(b'\n') {
        let line = line.map_err(LaekningError::Io)?;
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        reporter.report(line).map_err(LaekningError::Io)?;
    }
    Ok(reporter.stats())
}

/// Run the report command over `input`, or stdin when it is `None` or `-`.
///
/// # Errors
///
/// Returns error if the input cannot be opened or read
pub fn run_report(config: &Config, input: Option<&Path>) -> Result<ReportStats> {
    let mut reporter = Reporter::stdio()
        .with_filter(config.report.filter())
        .with_payload_logging(config.logging.include_payload);

    let stats = match input.filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            info!(input = %path.display(), "Reporting events from file");
            let file = File::open(path)
                .map_err(LaekningError::Io)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            report_lines(BufReader::new(file), &mut reporter)?
        }
        None => {
            info!("Reporting events from standard input");
            report_lines(io::stdin().lock(), &mut reporter)?
        }
    };

    info!(
        reported = stats.reported,
        skipped = stats.skipped,
        failed = stats.failed,
        "Finished reporting"
    );
    Ok(stats)
}
