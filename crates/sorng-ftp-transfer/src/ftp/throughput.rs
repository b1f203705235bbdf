//! Low-speed abort: fail a transfer whose rate stays under a floor for a
//! whole window.

use crate::ftp::config::TransferTimeouts;
use crate::ftp::error::{FtpError, FtpResult};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ThroughputGuard {
    limit_bps: u64,
    window: Duration,
    window_start: Instant,
    window_bytes: u64,
}

impl ThroughputGuard {
    pub fn new(timeouts: &TransferTimeouts) -> Self {
        Self::starting_at(timeouts, Instant::now())
    }

    pub fn starting_at(timeouts: &TransferTimeouts, now: Instant) -> Self {
        Self {
            limit_bps: timeouts.low_speed_limit_bps,
            window: timeouts.low_speed_window(),
            window_start: now,
            window_bytes: 0,
        }
    }

    /// Longest a single read or write may block before the window is
    /// certainly violated.
    pub fn stall_limit(&self) -> Duration {
        self.window
    }

    pub fn record(&mut self, bytes: u64) -> FtpResult<()> {
        self.record_at(bytes, Instant::now())
    }

    pub fn record_at(&mut self, bytes: u64, now: Instant) -> FtpResult<()> {
        self.window_bytes = self.window_bytes.saturating_add(bytes);
        if self.limit_bps == 0 || self.window.is_zero() {
            return Ok(());
        }
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return Ok(());
        }
        let floor = self.limit_bps.saturating_mul(elapsed.as_secs().max(1));
        if self.window_bytes < floor {
            return Err(FtpError::transfer_failed(format!(
                "Transfer rate below {} B/s for {:?}",
                self.limit_bps, elapsed
            )));
        }
        self.window_start = now;
        self.window_bytes = 0;
        Ok(())
    }
}
