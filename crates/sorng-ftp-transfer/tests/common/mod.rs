//! Shared fakes for the integration tests: scripted engines, recording
//! observers, and an in-process FTP server.

#![allow(dead_code)]

use async_trait::async_trait;
use sorng_ftp_transfer::ftp::*;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

// ─── Scripted engine ─────────────────────────────────────────────────

/// Engine that moves bytes through the hooks without touching the network.
#[derive(Default)]
pub struct ScriptedEngine {
    /// `(url, username)` for every `perform` call, in order.
    pub performed: Mutex<Vec<(String, String)>>,
    /// Zero-based `perform` call that fails.
    pub fail_on: Option<usize>,
    /// Size reported by `head_size` and served on download.
    pub remote_size: u64,
    /// While set, `perform` waits (polling `keep_going`) before moving data.
    pub hold: Option<Arc<AtomicBool>>,
    /// Keep holding even after `keep_going` turns false.
    pub ignore_cancel: bool,
}

impl ScriptedEngine {
    pub fn instant() -> Self {
        Self::default()
    }

    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_on: Some(index),
            ..Self::default()
        }
    }

    pub fn serving(remote_size: u64) -> Self {
        Self {
            remote_size,
            ..Self::default()
        }
    }

    /// Engine that blocks every transfer until the returned latch is cleared.
    pub fn held() -> (Self, Arc<AtomicBool>) {
        let hold = Arc::new(AtomicBool::new(true));
        let engine = Self {
            hold: Some(hold.clone()),
            ..Self::default()
        };
        (engine, hold)
    }

    pub fn urls(&self) -> Vec<String> {
        self.performed
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    async fn perform(
        &self,
        request: TransferRequest<'_>,
        hooks: &mut (dyn TransferHooks + Send),
    ) -> FtpResult<u64> {
        let index = {
            let mut performed = self.performed.lock().unwrap();
            performed.push((
                request.url.to_string(),
                request.credentials.username.clone(),
            ));
            performed.len() - 1
        };

        if let Some(hold) = &self.hold {
            while hold.load(Ordering::SeqCst) {
                if !self.ignore_cancel && !hooks.keep_going() {
                    return Err(FtpError::cancelled("held transfer aborted"));
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        if self.fail_on == Some(index) {
            return Err(FtpError::from_reply(550, "550 Permission denied"));
        }

        let mut moved = 0u64;
        match request.direction {
            TransferDirection::Upload => {
                let mut buf = vec![0u8; request.chunk_size];
                loop {
                    if !hooks.keep_going() {
                        return Err(FtpError::cancelled("upload aborted"));
                    }
                    let n = hooks.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    moved += n as u64;
                }
            }
            TransferDirection::Download => {
                let chunk = vec![0xABu8; request.chunk_size];
                while moved < self.remote_size {
                    if !hooks.keep_going() {
                        return Err(FtpError::cancelled("download aborted"));
                    }
                    let n = (self.remote_size - moved).min(chunk.len() as u64) as usize;
                    hooks.write(&chunk[..n])?;
                    moved += n as u64;
                }
            }
        }
        Ok(moved)
    }

    async fn head_size(
        &self,
        _url: &str,
        _credentials: &Credentials,
        _timeouts: &TransferTimeouts,
    ) -> FtpResult<u64> {
        Ok(self.remote_size)
    }
}

pub fn client_with(engine: Arc<ScriptedEngine>, chunk_size: usize) -> FtpClient {
    let config = FtpClientConfig {
        chunk_size,
        ..FtpClientConfig::default()
    };
    FtpClient::with_collaborators(config, engine, Arc::new(LocalFilesystem)).unwrap()
}

// ─── Observers ───────────────────────────────────────────────────────

/// Records every callback as `(file_name, current, total)`.
#[derive(Default)]
pub struct RecordingObserver {
    pub uploads: Mutex<Vec<(String, u64, u64)>>,
    pub downloads: Mutex<Vec<(String, u64, u64)>>,
}

impl RecordingObserver {
    pub fn upload_events(&self) -> Vec<(String, u64, u64)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn download_events(&self) -> Vec<(String, u64, u64)> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.uploads.lock().unwrap().len() + self.downloads.lock().unwrap().len()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_upload_progress(&self, file_name: &str, current: u64, total: u64) {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), current, total));
    }

    fn on_download_progress(&self, file_name: &str, current: u64, total: u64) {
        self.downloads
            .lock()
            .unwrap()
            .push((file_name.to_string(), current, total));
    }
}

pub struct PanickingObserver;

impl ProgressObserver for PanickingObserver {
    fn on_upload_progress(&self, _: &str, _: u64, _: u64) {
        panic!("observer blew up");
    }

    fn on_download_progress(&self, _: &str, _: u64, _: u64) {
        panic!("observer blew up");
    }
}

// ─── Local fixtures ──────────────────────────────────────────────────

/// `clip.h264` (64 B), `notes.txt` (5 B), `raw.bin` (0 B).
pub fn media_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("clip.h264"), vec![7u8; 64]).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
    std::fs::write(dir.path().join("raw.bin"), b"").unwrap();
    dir
}

pub fn path_str(path: &std::path::Path) -> String {
    path.to_str().unwrap().to_string()
}

// ─── Fake FTP server ─────────────────────────────────────────────────

/// Minimal in-process FTP server: USER/PASS, TYPE, MKD, PASV, EPSV, PORT,
/// SIZE, STOR, RETR, QUIT.
pub struct FakeFtpServer {
    pub addr: SocketAddr,
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
struct ServerState {
    password: String,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    dirs: Arc<Mutex<HashSet<String>>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeFtpServer {
    pub async fn start(password: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ServerState {
            password: password.to_string(),
            files: Arc::new(Mutex::new(HashMap::new())),
            dirs: Arc::new(Mutex::new(HashSet::new())),
            commands: Arc::new(Mutex::new(Vec::new())),
        };
        let server = Self {
            addr,
            files: state.files.clone(),
            commands: state.commands.clone(),
        };
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                tokio::spawn(serve(sock, state.clone()));
            }
        });
        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("ftp://{}{}", self.addr, path)
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn saw(&self, command: &str) -> bool {
        self.commands.lock().unwrap().iter().any(|c| c == command)
    }
}

async fn reply(wr: &mut OwnedWriteHalf, line: &str) {
    let _ = wr.write_all(format!("{}\r\n", line).as_bytes()).await;
}

async fn open_data(passive: &mut Option<TcpListener>, active: &mut Option<SocketAddr>) -> TcpStream {
    if let Some(listener) = passive.take() {
        return listener.accept().await.unwrap().0;
    }
    let addr = active.take().expect("PORT or PASV before transfer");
    TcpStream::connect(addr).await.unwrap()
}

async fn serve(sock: TcpStream, state: ServerState) {
    let (rd, mut wr) = sock.into_split();
    let mut lines = BufReader::new(rd).lines();
    reply(&mut wr, "220 fake ftp ready").await;

    let mut passive: Option<TcpListener> = None;
    let mut active: Option<SocketAddr> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        state.commands.lock().unwrap().push(line.clone());
        let (cmd, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let arg = arg.to_string();
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => reply(&mut wr, "331 Password required").await,
            "PASS" => {
                if arg == state.password {
                    reply(&mut wr, "230 Logged in").await
                } else {
                    reply(&mut wr, "530 Login incorrect").await
                }
            }
            "TYPE" => reply(&mut wr, "200 Type set").await,
            "MKD" => {
                let created = state.dirs.lock().unwrap().insert(arg.clone());
                if created {
                    reply(&mut wr, &format!("257 \"{}\" created", arg)).await
                } else {
                    reply(&mut wr, "550 Directory exists").await
                }
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                reply(
                    &mut wr,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port / 256,
                        port % 256
                    ),
                )
                .await
            }
            "EPSV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                reply(
                    &mut wr,
                    &format!("229 Entering Extended Passive Mode (|||{}|)", port),
                )
                .await
            }
            "PORT" => {
                let n: Vec<u16> = arg.split(',').map(|p| p.trim().parse().unwrap()).collect();
                let ip = format!("{}.{}.{}.{}", n[0], n[1], n[2], n[3]);
                active = Some(format!("{}:{}", ip, n[4] * 256 + n[5]).parse().unwrap());
                reply(&mut wr, "200 PORT ok").await
            }
            "SIZE" => {
                let size = state.files.lock().unwrap().get(&arg).map(|d| d.len());
                match size {
                    Some(len) => reply(&mut wr, &format!("213 {}", len)).await,
                    None => reply(&mut wr, "550 No such file").await,
                }
            }
            "STOR" => {
                reply(&mut wr, "150 Opening data connection").await;
                let mut data = open_data(&mut passive, &mut active).await;
                let mut buf = Vec::new();
                let _ = data.read_to_end(&mut buf).await;
                state.files.lock().unwrap().insert(arg, buf);
                reply(&mut wr, "226 Transfer complete").await
            }
            "RETR" => {
                let content = state.files.lock().unwrap().get(&arg).cloned();
                match content {
                    None => reply(&mut wr, "550 No such file").await,
                    Some(bytes) => {
                        reply(&mut wr, "150 Opening data connection").await;
                        let mut data = open_data(&mut passive, &mut active).await;
                        let _ = data.write_all(&bytes).await;
                        let _ = data.shutdown().await;
                        drop(data);
                        reply(&mut wr, "226 Transfer complete").await
                    }
                }
            }
            "QUIT" => {
                reply(&mut wr, "221 Bye").await;
                break;
            }
            _ => reply(&mut wr, "502 Not implemented").await,
        }
    }
}
