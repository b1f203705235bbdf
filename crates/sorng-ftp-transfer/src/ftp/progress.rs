//! Progress and cancellation state shared between the worker and callers.

use crate::ftp::types::ProgressSnapshot;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ProgressInner {
    file_name: String,
    current_bytes: u64,
    total_bytes: u64,
    cancel_requested: bool,
}

/// Lock-protected progress record for the in-flight session.
///
/// The worker writes; any thread may snapshot. Cancellation is sticky until
/// the next [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct ProgressState {
    inner: Mutex<ProgressInner>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every field and clear the cancel bit. Called at session start.
    pub fn reset(&self) {
        *self.lock() = ProgressInner::default();
    }

    pub fn request_cancel(&self) {
        self.lock().cancel_requested = true;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    pub fn set_total(&self, total_bytes: u64) {
        self.lock().total_bytes = total_bytes;
    }

    /// Name the file now being transferred. Byte counters are untouched so
    /// a batch keeps accumulating.
    pub fn begin_file(&self, file_name: &str) {
        let mut p = self.lock();
        p.file_name.clear();
        p.file_name.push_str(file_name);
    }

    /// Upload accounting: add the bytes just read from local storage.
    pub fn record_read(&self, delta: u64) {
        let mut p = self.lock();
        p.current_bytes = p.current_bytes.saturating_add(delta);
    }

    /// Download accounting: the absolute offset written so far.
    ///
    /// Never moves backwards within a session.
    pub fn record_written(&self, absolute: u64) {
        let mut p = self.lock();
        if absolute > p.current_bytes {
            p.current_bytes = absolute;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let p = self.lock();
        ProgressSnapshot {
            file_name: p.file_name.clone(),
            current_bytes: p.current_bytes,
            total_bytes: p.total_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
