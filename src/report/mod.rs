//! Event decoding and reporting
//!
//! Turns raw event bodies into human-readable reports.
//!
//! # Modules
//!
//! - [`record`]: decoding raw bodies and tolerant typed field reads
//! - [`kind`]: the event kind dispatch tag
//! - [`render`]: rendering a record into report lines
//! - [`filter`]: optional restriction to configured event kinds
//! - [`reporter`]: writing reports and per-event diagnostics
//!
//! # Report format
//!
//! ```text
//! ============================
//! EventType: OrderPlaced
//! OrderId: O1
//! Customer: Jane
//! ItemCount: 3
//! GiftWrap: false
//! ----------------------------
//! ```

pub mod filter;
pub mod kind;
pub mod record;
pub mod render;
pub mod reporter;

pub use filter::KindFilter;
pub use kind::EventKind;
pub use record::{DecodeError, EventRecord, FieldValue};
pub use render::{render, FOOTER_SEPARATOR, HEADER_SEPARATOR};
pub use reporter::{ReportOutcome, ReportStats, Reporter};
