//! Control-channel codec (RFC 959 §4): CRLF-terminated commands and
//! single- or multi-line replies, each read bounded by the response timeout.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    response_timeout: Duration,
}

impl ControlChannel {
    pub fn new(stream: TcpStream, response_timeout: Duration) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            reader: BufReader::new(rd),
            writer: wr,
            response_timeout,
        }
    }

    /// Local address of the control socket; active mode advertises it.
    pub fn local_addr(&self) -> FtpResult<std::net::SocketAddr> {
        Ok(self.writer.local_addr()?)
    }

    /// Send a raw command (CRLF appended).
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes()).await?;
        if cmd.starts_with("PASS ") {
            log::trace!(">>> PASS ****");
        } else {
            log::trace!(">>> {}", cmd);
        }
        Ok(())
    }

    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).await?;
        if n == 0 {
            return Err(FtpError::disconnected("Server closed connection"));
        }
        Ok(buf)
    }

    /// Read one complete reply, waiting at most the response timeout.
    ///
    /// Multi-line replies open with `NNN-` and end with `NNN `.
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let wait = self.response_timeout;
        timeout(wait, self.read_response_inner())
            .await
            .map_err(|_| FtpError::timeout(format!("No reply within {:?}", wait)))?
    }

    async fn read_response_inner(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let first = first.trim_end_matches(['\r', '\n']).to_string();
        let code = parse_code(&first)?;

        let mut lines = vec![first];
        if lines[0].as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next = next.trim_end_matches(['\r', '\n']).to_string();
                let done = next.starts_with(&terminator);
                lines.push(next);
                if done {
                    break;
                }
            }
        }

        log::trace!("<<< {}", lines.last().map(String::as_str).unwrap_or(""));
        Ok(FtpResponse { code, lines })
    }

    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Execute and require a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    /// Best-effort QUIT; the connection is dropped either way.
    pub async fn quit(mut self) {
        let _ = self.execute("QUIT").await;
    }
}

/// Parse the 3-digit reply code from the start of a line.
pub(crate) fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("Invalid reply: '{}'", line)))
}
