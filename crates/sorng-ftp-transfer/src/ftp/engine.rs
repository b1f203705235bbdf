//! The transfer-engine seam: what the worker needs from something that can
//! move one file over FTP.

use crate::ftp::config::TransferTimeouts;
use crate::ftp::error::FtpResult;
use crate::ftp::types::{Credentials, TransferDirection};
use async_trait::async_trait;
use std::io;

/// Parameters for one complete file transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    /// `ftp://host[:port]/path`
    pub url: &'a str,
    pub credentials: &'a Credentials,
    pub direction: TransferDirection,
    pub timeouts: &'a TransferTimeouts,
    /// Size of the buffer passed to `read`, and the largest slice passed to
    /// `write`.
    pub chunk_size: usize,
}

/// Callbacks the engine drives while data flows.
///
/// `read` feeds uploads, `write` drains downloads, and `keep_going` is polled
/// before connecting and after every chunk; returning `false` aborts the
/// transfer with [`FtpErrorKind::Cancelled`](crate::ftp::error::FtpErrorKind::Cancelled).
pub trait TransferHooks {
    /// Fill `buf` with the next bytes to upload. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Consume downloaded bytes; returns how many were stored.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    fn keep_going(&mut self) -> bool;
}

#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Run one transfer to completion. Returns the number of payload bytes
    /// moved.
    async fn perform(
        &self,
        request: TransferRequest<'_>,
        hooks: &mut (dyn TransferHooks + Send),
    ) -> FtpResult<u64>;

    /// Metadata-only size query for a remote file.
    async fn head_size(
        &self,
        url: &str,
        credentials: &Credentials,
        timeouts: &TransferTimeouts,
    ) -> FtpResult<u64>;
}
