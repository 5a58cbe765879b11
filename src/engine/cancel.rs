//! Cooperative cancellation
//!
//! A shared flag polled at case and phase boundaries.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag for one execution
///
/// Triggering is one-way; the flag is checked cooperatively, never forced.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    triggered: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
