//! laekning-eventhub - Event Hubs event reporter library
//!
//! This library reads the Laekning pharmacy event stream from Azure Event
//! Hubs and prints a short, type-specific report for every event.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `report`: Event decoding, rendering, filtering and the reporter
//! - `eventhub`: Connection strings, consumer settings and the partition consumer
//! - `secrets`: Token credentials and the Key Vault secret client
//! - `commands`: The `listen` and `report` command handlers
//! - `config`: Configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```
//! use laekning_eventhub::report::Reporter;
//!
//! let mut reporter = Reporter::new(Vec::new(), Vec::new());
//! reporter
//!     .report(br#"{"EventType":"PrescriptionUploaded","PrescriptionId":"P1"}"#)
//!     .unwrap();
//!
//! let (out, _) = reporter.into_sinks();
//! assert!(String::from_utf8(out).unwrap().contains("PrescriptionId: P1"));
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod eventhub;
pub mod logging;
pub mod report;
pub mod secrets;

// Re-export commonly used types
pub use config::Config;
pub use error::{LaekningError, Result};
pub use report::{EventKind, EventRecord, Reporter};
