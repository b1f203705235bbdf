//! Data-channel negotiation for the default engine.
//!
//! - **PASV**: server opens a port, client connects (RFC 959)
//! - **EPSV**: extended passive, port only (RFC 2428)
//! - **PORT**: client listens, server connects (RFC 959)

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::ControlChannel;
use crate::ftp::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("static regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("static regex");
}

/// A negotiated but possibly not yet connected data channel.
///
/// Passive channels are connected before the transfer command is sent;
/// active channels accept the server's connection after it.
pub enum PendingData {
    Connected(TcpStream),
    Listening(TcpListener),
}

impl PendingData {
    /// Obtain the connected stream, accepting if in active mode.
    pub async fn establish(self, wait: Duration) -> FtpResult<TcpStream> {
        match self {
            PendingData::Connected(tcp) => Ok(tcp),
            PendingData::Listening(listener) => {
                let (tcp, _) = timeout(wait, listener.accept())
                    .await
                    .map_err(|_| FtpError::data_channel("PORT accept timed out"))?
                    .map_err(|e| FtpError::data_channel(format!("PORT accept: {}", e)))?;
                Ok(tcp)
            }
        }
    }
}

/// Negotiate a data channel in `mode`.
pub async fn open(
    control: &mut ControlChannel,
    mode: DataChannelMode,
    host: &str,
    connect_timeout: Duration,
    active_bind: Option<&str>,
) -> FtpResult<PendingData> {
    match mode {
        DataChannelMode::Passive => {
            let resp = control.expect_ok("PASV").await?;
            let addr = parse_pasv_response(&resp.text())?;
            connect(addr.to_string(), connect_timeout, "PASV").await
        }
        DataChannelMode::ExtendedPassive => {
            let resp = control.expect_ok("EPSV").await?;
            let port = parse_epsv_response(&resp.text())?;
            connect(format!("{}:{}", host, port), connect_timeout, "EPSV").await
        }
        DataChannelMode::Active => open_port(control, active_bind).await,
    }
}

async fn connect(addr: String, wait: Duration, label: &str) -> FtpResult<PendingData> {
    let tcp = timeout(wait, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel(format!("{} data connect to {} timed out", label, addr)))?
        .map_err(|e| FtpError::data_channel(format!("{} data connect to {}: {}", label, addr, e)))?;
    Ok(PendingData::Connected(tcp))
}

/// Listen locally and advertise the address with `PORT h1,h2,h3,h4,p1,p2`.
async fn open_port(control: &mut ControlChannel, bind: Option<&str>) -> FtpResult<PendingData> {
    let ip = match bind {
        Some(b) => b
            .parse::<IpAddr>()
            .map_err(|_| FtpError::invalid_config(format!("Bad active bind address '{}'", b)))?,
        None => control.local_addr()?.ip(),
    };
    let IpAddr::V4(v4) = ip else {
        return Err(FtpError::data_channel("PORT requires IPv4"));
    };

    let listener = TcpListener::bind(SocketAddr::new(ip, 0))
        .await
        .map_err(|e| FtpError::data_channel(format!("PORT bind: {}", e)))?;
    let port = listener.local_addr()?.port();
    let o = v4.octets();
    control
        .expect_ok(&format!(
            "PORT {},{},{},{},{},{}",
            o[0],
            o[1],
            o[2],
            o[3],
            port / 256,
            port % 256
        ))
        .await?;
    Ok(PendingData::Listening(listener))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 reply.
pub(crate) fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;
    let mut nums = [0u8; 6];
    for (i, n) in nums.iter_mut().enumerate() {
        *n = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::protocol_error("PASV number out of range"))?;
    }
    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

/// Parse the port from `229 Entering Extended Passive Mode (|||port|)`.
pub(crate) fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}
