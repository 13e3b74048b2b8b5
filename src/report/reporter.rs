//! Reporter writing event reports and diagnostics.
//!
//! The reporter owns two sinks: one for reports (standard output in the
//! binary) and one for per-event diagnostics (standard error). Each call to
//! [`Reporter::report`] handles exactly one raw event and returns a
//! [`ReportOutcome`]; a malformed event produces one diagnostic line and
//! never an error.

use std::io::{self, Write};

use tracing::debug;

use super::filter::KindFilter;
use super::kind::EventKind;
use super::record::{DecodeError, EventRecord};
use super::render::render;

/// What happened to one raw event.
#[derive(Debug)]
pub enum ReportOutcome {
    /// The event was decoded and its report written.
    Reported(EventKind),
    /// The event was decoded but its kind is filtered out.
    Skipped(EventKind),
    /// The event could not be decoded; a diagnostic was written.
    Failed(DecodeError),
}

/// Running totals of reporter outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    /// Events whose report was written.
    pub reported: u64,
    /// Events skipped by the kind filter.
    pub skipped: u64,
    /// Events that failed to decode.
    pub failed: u64,
}

impl ReportStats {
    /// Total events seen.
    pub fn total(&self) -> u64 {
        self.reported + self.skipped + self.failed
    }
}

/// Decodes raw events and writes their reports.
///
/// # Examples
///
/// ```
/// use laekning_eventhub::report::Reporter;
///
/// let mut reporter = Reporter::new(Vec::new(), Vec::new());
/// reporter.report(br#"{"EventType":"OrderPlaced","OrderId":"O1"}"#).unwrap();
/// reporter.report(b"not-json").unwrap();
///
/// let (out, err) = reporter.into_sinks();
/// assert!(String::from_utf8(out).unwrap().contains("OrderId: O1"));
/// assert!(String::from_utf8(err).unwrap().starts_with("Error parsing event: "));
/// ```
pub struct Reporter<O: Write, E: Write> {
    out: O,
    err: E,
    filter: KindFilter,
    include_payload: bool,
    stats: ReportStats,
}

impl Reporter<io::Stdout, io::Stderr> {
    /// Create a reporter writing to standard output and standard error.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Reporter<O, E> {
    /// Create a reporter over the given sinks with no kind filter.
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            filter: KindFilter::default(),
            include_payload: false,
            stats: ReportStats::default(),
        }
    }

    /// Restrict reporting to the kinds accepted by `filter`.
    pub fn with_filter(mut self, filter: KindFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Log every raw body at debug level before decoding.
    pub fn with_payload_logging(mut self, include_payload: bool) -> Self {
        self.include_payload = include_payload;
        self
    }

    /// Report one raw event.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to one of the sinks fails. Decode
    /// failures are reported on the diagnostic sink and returned as
    /// [`ReportOutcome::Failed`].
    pub fn report(&mut self, body: &[u8]) -> io::Result<ReportOutcome> {
        if self.include_payload {
            debug!(payload = %String::from_utf8_lossy(body), "Raw event body");
        }

        let record = match EventRecord::decode(body) {
            Ok(record) => record,
            Err(e) => {
                writeln!(self.err, "Error parsing event: {}", e)?;
                self.err.flush()?;
                self.stats.failed += 1;
                return Ok(ReportOutcome::Failed(e));
            }
        };

        let kind = record.kind();
        if !kind.is_recognized() {
            debug!(event_type = %kind, "Unrecognized event type; reporting kind only");
        }
        if !self.filter.allows(&kind) {
            debug!(event_type = %kind, "Event filtered out by configured event types");
            self.stats.skipped += 1;
            return Ok(ReportOutcome::Skipped(kind));
        }

        let mut text = render(&record).join("\n");
        text.push('\n');
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        self.stats.reported += 1;
        Ok(ReportOutcome::Reported(kind))
    }

    /// Totals since the reporter was created.
    pub fn stats(&self) -> ReportStats {
        self.stats
    }

    /// Consume the reporter and return its sinks.
    pub fn into_sinks(self) -> (O, E) {
        (self.out, self.err)
    }
}
