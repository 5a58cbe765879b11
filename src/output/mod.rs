//! Output formatting module
//!
//! Table, JSON, and summary renderings of executions and results.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
