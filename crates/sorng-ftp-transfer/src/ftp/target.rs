//! `ftp://` URL handling for the default engine.

use crate::ftp::error::{FtpError, FtpResult};
use percent_encoding::percent_decode_str;
use url::Url;

/// Host, port and decoded path of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    /// Absolute path on the server, percent-decoded.
    pub path: String,
}

impl RemoteTarget {
    pub fn parse(raw: &str) -> FtpResult<Self> {
        let url = Url::parse(raw)?;
        if url.scheme() != "ftp" {
            return Err(FtpError::invalid_config(format!(
                "Unsupported scheme '{}' in {}",
                url.scheme(),
                raw
            )));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FtpError::invalid_config(format!("No host in {}", raw)))?
            .to_string();
        let port = url.port().unwrap_or(21);

        let mut path = String::new();
        for seg in url.path().split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode_str(seg).decode_utf8().map_err(|_| {
                FtpError::invalid_config(format!("Path segment '{}' is not UTF-8 in {}", seg, raw))
            })?;
            path.push('/');
            path.push_str(&decoded);
        }
        if path.is_empty() {
            return Err(FtpError::invalid_config(format!("No file path in {}", raw)));
        }
        Ok(Self { host, port, path })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Every ancestor directory of the file, shallowest first.
    /// `/a/b/c.txt` gives `["/a", "/a/b"]`.
    pub fn parent_dirs(&self) -> Vec<String> {
        let parts: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();
        let mut dirs = Vec::new();
        let mut cur = String::new();
        for part in parts.iter().take(parts.len().saturating_sub(1)) {
            cur.push('/');
            cur.push_str(part);
            dirs.push(cur.clone());
        }
        dirs
    }
}
