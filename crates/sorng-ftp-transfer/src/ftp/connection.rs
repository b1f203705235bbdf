//! Control connection setup: TCP connect under the connect timeout, greeting,
//! login, binary mode.

use crate::ftp::config::TransferTimeouts;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::target::RemoteTarget;
use crate::ftp::types::Credentials;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connect to `target`, log in, and switch to `TYPE I`.
pub async fn open_session(
    target: &RemoteTarget,
    credentials: &Credentials,
    timeouts: &TransferTimeouts,
) -> FtpResult<ControlChannel> {
    let addr = target.address();
    let tcp = timeout(timeouts.connect(), TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;
    tcp.set_nodelay(true).ok();

    let mut control = ControlChannel::new(tcp, timeouts.response());

    // 120 = "service ready in nnn minutes"; the real greeting follows.
    let mut banner = control.read_response().await?;
    while banner.is_preliminary() {
        banner = control.read_response().await?;
    }
    if !banner.is_completion() {
        return Err(FtpError::from_reply(banner.code, &banner.text()));
    }

    login(&mut control, credentials).await?;
    control.expect_ok("TYPE I").await?;
    log::debug!("FTP session ready on {}", addr);
    Ok(control)
}

async fn login(control: &mut ControlChannel, credentials: &Credentials) -> FtpResult<()> {
    let user = control
        .execute(&format!("USER {}", credentials.username))
        .await?;
    if user.is_completion() {
        return Ok(());
    }
    if !user.is_intermediate() {
        return Err(FtpError::auth_failed(format!("USER rejected: {}", user.text())).with_code(user.code));
    }
    let pass = control
        .execute(&format!("PASS {}", credentials.password))
        .await?;
    if !pass.is_completion() {
        return Err(FtpError::auth_failed(format!("Login failed: {}", pass.text())).with_code(pass.code));
    }
    Ok(())
}
