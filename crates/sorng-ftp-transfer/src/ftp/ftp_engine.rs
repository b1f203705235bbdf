//! Default [`TransferEngine`] speaking plain FTP over tokio sockets.
//!
//! One control connection per call: connect → login → `TYPE I` →
//! (`MKD` parents) → data channel → `STOR`/`RETR` → `226` → `QUIT`.

use crate::ftp::config::{FtpClientConfig, TransferTimeouts};
use crate::ftp::connection::open_session;
use crate::ftp::data_channel;
use crate::ftp::engine::{TransferEngine, TransferHooks, TransferRequest};
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::target::RemoteTarget;
use crate::ftp::throughput::ThroughputGuard;
use crate::ftp::types::{Credentials, DataChannelMode, TransferDirection};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct FtpEngine {
    pub data_channel_mode: DataChannelMode,
    pub active_bind_address: Option<String>,
    pub create_missing_dirs: bool,
}

impl Default for FtpEngine {
    fn default() -> Self {
        Self::from_config(&FtpClientConfig::default())
    }
}

impl FtpEngine {
    pub fn from_config(config: &FtpClientConfig) -> Self {
        Self {
            data_channel_mode: config.data_channel_mode,
            active_bind_address: config.active_bind_address.clone(),
            create_missing_dirs: config.create_missing_dirs,
        }
    }

    async fn open_data(
        &self,
        control: &mut ControlChannel,
        target: &RemoteTarget,
        command: &str,
        timeouts: &TransferTimeouts,
    ) -> FtpResult<TcpStream> {
        let pending = data_channel::open(
            control,
            self.data_channel_mode,
            &target.host,
            timeouts.connect(),
            self.active_bind_address.as_deref(),
        )
        .await?;

        let resp = control.execute(command).await?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        pending.establish(timeouts.connect()).await
    }

    async fn store(
        &self,
        control: &mut ControlChannel,
        target: &RemoteTarget,
        request: &TransferRequest<'_>,
        hooks: &mut (dyn TransferHooks + Send),
    ) -> FtpResult<u64> {
        if self.create_missing_dirs {
            // 550 for an existing directory is expected; only transport errors abort.
            for dir in target.parent_dirs() {
                control.execute(&format!("MKD {}", dir)).await?;
            }
        }

        let mut data = self
            .open_data(control, target, &format!("STOR {}", target.path), request.timeouts)
            .await?;

        let mut guard = ThroughputGuard::new(request.timeouts);
        let mut buf = vec![0u8; request.chunk_size.max(1)];
        let mut sent = 0u64;
        loop {
            if !hooks.keep_going() {
                return Err(FtpError::cancelled(format!("Upload of {} aborted", target.path)));
            }
            let n = hooks
                .read(&mut buf)
                .map_err(|e| FtpError::io_error(format!("Local read: {}", e)))?;
            if n == 0 {
                break;
            }
            bounded(guard.stall_limit(), data.write_all(&buf[..n])).await?;
            sent += n as u64;
            guard.record(n as u64)?;
        }
        data.shutdown().await?;
        drop(data);

        finish_transfer(control).await?;
        Ok(sent)
    }

    async fn retrieve(
        &self,
        control: &mut ControlChannel,
        target: &RemoteTarget,
        request: &TransferRequest<'_>,
        hooks: &mut (dyn TransferHooks + Send),
    ) -> FtpResult<u64> {
        let mut data = self
            .open_data(control, target, &format!("RETR {}", target.path), request.timeouts)
            .await?;

        let mut guard = ThroughputGuard::new(request.timeouts);
        let mut buf = vec![0u8; request.chunk_size.max(1)];
        let mut received = 0u64;
        loop {
            if !hooks.keep_going() {
                return Err(FtpError::cancelled(format!("Download of {} aborted", target.path)));
            }
            let n = bounded(guard.stall_limit(), data.read(&mut buf)).await?;
            if n == 0 {
                break;
            }
            let stored = hooks
                .write(&buf[..n])
                .map_err(|e| FtpError::io_error(format!("Local write: {}", e)))?;
            if stored != n {
                return Err(FtpError::io_error(format!(
                    "Local write stored {} of {} bytes",
                    stored, n
                )));
            }
            received += n as u64;
            guard.record(n as u64)?;
        }
        drop(data);

        finish_transfer(control).await?;
        Ok(received)
    }
}

#[async_trait]
impl TransferEngine for FtpEngine {
    async fn perform(
        &self,
        request: TransferRequest<'_>,
        hooks: &mut (dyn TransferHooks + Send),
    ) -> FtpResult<u64> {
        if !hooks.keep_going() {
            return Err(FtpError::cancelled("Aborted before connecting"));
        }
        let target = RemoteTarget::parse(request.url)?;
        let mut control = open_session(&target, request.credentials, request.timeouts).await?;

        let result = match request.direction {
            TransferDirection::Upload => self.store(&mut control, &target, &request, hooks).await,
            TransferDirection::Download => {
                self.retrieve(&mut control, &target, &request, hooks).await
            }
        };
        if result.is_ok() {
            control.quit().await;
        }
        result
    }

    async fn head_size(
        &self,
        url: &str,
        credentials: &Credentials,
        timeouts: &TransferTimeouts,
    ) -> FtpResult<u64> {
        let target = RemoteTarget::parse(url)?;
        let mut control = open_session(&target, credentials, timeouts).await?;
        let resp = control.expect_ok(&format!("SIZE {}", target.path)).await?;
        control.quit().await;
        parse_size_reply(&resp.text())
    }
}

/// Wait for the `226` that closes a data transfer.
async fn finish_transfer(control: &mut ControlChannel) -> FtpResult<()> {
    let done = control.read_response().await?;
    if !done.is_completion() {
        return Err(FtpError::from_reply(done.code, &done.text()));
    }
    Ok(())
}

/// Run a socket operation, failing if it blocks longer than `limit`.
async fn bounded<T, F>(limit: Duration, op: F) -> FtpResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    if limit.is_zero() {
        return Ok(op.await?);
    }
    match tokio::time::timeout(limit, op).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(FtpError::transfer_failed(format!(
            "Data channel stalled for {:?}",
            limit
        ))),
    }
}

/// `213 12345` → 12345.
pub(crate) fn parse_size_reply(text: &str) -> FtpResult<u64> {
    text.split_whitespace()
        .nth(1)
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse SIZE: {}", text)))
}
