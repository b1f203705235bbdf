//! Client configuration.

use crate::ftp::error::FtpResult;
use crate::ftp::types::{Credentials, DataChannelMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Limits applied to every engine invocation so a stalled peer cannot wedge
/// the worker thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferTimeouts {
    /// TCP connect timeout (control and data channel).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Maximum wait for a single control-channel reply.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_sec: u64,
    /// Abort when throughput stays below this many bytes/s ...
    #[serde(default = "default_low_speed_limit")]
    pub low_speed_limit_bps: u64,
    /// ... for this many seconds.
    #[serde(default = "default_low_speed_time")]
    pub low_speed_time_sec: u64,
}

fn default_connect_timeout() -> u64 {
    5
}
fn default_response_timeout() -> u64 {
    3
}
fn default_low_speed_limit() -> u64 {
    1
}
fn default_low_speed_time() -> u64 {
    10
}

impl Default for TransferTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_sec: default_connect_timeout(),
            response_timeout_sec: default_response_timeout(),
            low_speed_limit_bps: default_low_speed_limit(),
            low_speed_time_sec: default_low_speed_time(),
        }
    }
}

impl TransferTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn response(&self) -> Duration {
        Duration::from_secs(self.response_timeout_sec)
    }

    pub fn low_speed_window(&self) -> Duration {
        Duration::from_secs(self.low_speed_time_sec)
    }
}

/// Configuration for an [`FtpClient`](crate::ftp::client::FtpClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpClientConfig {
    /// Initial credentials, `user:password`.
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub timeouts: TransferTimeouts,
    #[serde(default)]
    pub data_channel_mode: DataChannelMode,
    /// Local address to bind for active-mode data connections.
    #[serde(default)]
    pub active_bind_address: Option<String>,
    /// Buffer size for each read/write hook call.
    #[serde(default = "default_chunk")]
    pub chunk_size: usize,
    /// Create missing remote directories before STOR.
    #[serde(default = "default_true")]
    pub create_missing_dirs: bool,
}

fn default_chunk() -> usize {
    16_384
}
fn default_true() -> bool {
    true
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            timeouts: TransferTimeouts::default(),
            data_channel_mode: DataChannelMode::Passive,
            active_bind_address: None,
            chunk_size: default_chunk(),
            create_missing_dirs: true,
        }
    }
}

impl FtpClientConfig {
    pub fn from_json(json: &str) -> FtpResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> FtpResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
