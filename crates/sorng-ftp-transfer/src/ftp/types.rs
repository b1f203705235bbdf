//! Shared types for the transfer client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ─── Session ─────────────────────────────────────────────────────────

/// What the current (or last) session is doing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum OperationMode {
    #[default]
    None,
    Upload,
    Download,
}

/// Direction handed to the transfer engine for a single file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// One queued file transfer. `remote_path` is a full `ftp://` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferTask {
    pub remote_path: String,
    pub local_path: String,
}

impl TransferTask {
    pub fn new(remote_path: impl Into<String>, local_path: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
        }
    }
}

/// Point-in-time copy of the in-flight transfer's progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub file_name: String,
    pub current_bytes: u64,
    pub total_bytes: u64,
}

/// Record of a finished session, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub mode: OperationMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub succeeded: bool,
}

// ─── Credentials ─────────────────────────────────────────────────────

/// Login pair, written as `user:password` in config and on the API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse `user:password`. Everything after the first `:` is the password.
    pub fn parse(userpwd: &str) -> Option<Self> {
        if userpwd.is_empty() {
            return None;
        }
        let (user, pass) = userpwd.split_once(':').unwrap_or((userpwd, ""));
        if user.is_empty() {
            return None;
        }
        Some(Self::new(user, pass))
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("anonymous", "anonymous@")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid credentials '{}': expected user:password", s))
    }
}

impl TryFrom<String> for Credentials {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Credentials> for String {
    fn from(c: Credentials) -> String {
        format!("{}:{}", c.username, c.password)
    }
}

// ─── Directory filtering ─────────────────────────────────────────────

/// Whether the extension list selects or rejects files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    Allow,
    Deny,
}

/// Case-sensitive extension filter for directory uploads.
///
/// Extensions may be given with or without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionFilter {
    pub extensions: Vec<String>,
    pub mode: FilterMode,
}

impl ExtensionFilter {
    pub fn allow<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(extensions, FilterMode::Allow)
    }

    pub fn deny<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(extensions, FilterMode::Deny)
    }

    fn build<I, S>(extensions: I, mode: FilterMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_string())
                .collect(),
            mode,
        }
    }

    /// Whether `path` should be uploaded.
    pub fn matches(&self, path: &Path) -> bool {
        let listed = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|want| want.trim_start_matches('.') == ext)
            })
            .unwrap_or(false);
        match self.mode {
            FilterMode::Allow => listed,
            FilterMode::Deny => !listed,
        }
    }
}

// ─── Wire ────────────────────────────────────────────────────────────

/// Data channel negotiation used by the default engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataChannelMode {
    #[default]
    Passive,
    ExtendedPassive,
    Active,
}

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Positive-preliminary (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive-intermediate (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}
