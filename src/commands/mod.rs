/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `listen`: Resolve the stream secrets and report events until stopped
- `report`: Report newline-delimited event bodies from a file or stdin

Both commands share the reporter from [`crate::report`], so their output is
identical for the same events.
*/

pub mod listen;
pub mod report;

pub use listen::{poll_loop, run_listen, PollOptions};
pub use report::{report_lines, run_report};
