//! Shared utilities
//!
//! Logging setup lives here.

pub mod logger;
