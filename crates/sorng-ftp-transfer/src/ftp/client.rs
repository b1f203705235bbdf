//! Public facade: validates requests, admits at most one session at a time,
//! and hands it to the background worker.
//!
//! Lifecycle of a session: validate → `compare_and_swap(false, true)` →
//! reset progress → send the session plan → worker runs → result stored →
//! flag cleared.
//!
//! `*_async` methods return `true` only when a session was accepted;
//! `*_sync` methods return `true` only when it also completed successfully.

use crate::ftp::config::FtpClientConfig;
use crate::ftp::engine::TransferEngine;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::fs::{Filesystem, LocalFilesystem};
use crate::ftp::ftp_engine::FtpEngine;
use crate::ftp::observer::ProgressObserver;
use crate::ftp::queue::{plan_directory_upload, TaskQueue};
use crate::ftp::types::*;
use crate::ftp::worker::{SessionJob, SessionPlan, SessionState, Worker};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

/// Single-flight FTP transfer client.
///
/// Safe to share across threads (`Arc<FtpClient>`); every method takes
/// `&self`.
pub struct FtpClient {
    config: FtpClientConfig,
    credentials: Mutex<Credentials>,
    fs: Arc<dyn Filesystem>,
    state: Arc<SessionState>,
    sender: Option<UnboundedSender<SessionPlan>>,
    worker: Option<JoinHandle<()>>,
}

impl FtpClient {
    /// Client backed by [`FtpEngine`] and the local filesystem.
    pub fn new(config: FtpClientConfig) -> FtpResult<Self> {
        let engine = Arc::new(FtpEngine::from_config(&config));
        Self::with_collaborators(config, engine, Arc::new(LocalFilesystem))
    }

    /// Client with an explicit engine and filesystem.
    pub fn with_collaborators(
        config: FtpClientConfig,
        engine: Arc<dyn TransferEngine>,
        fs: Arc<dyn Filesystem>,
    ) -> FtpResult<Self> {
        if config.chunk_size == 0 {
            return Err(FtpError::invalid_config("chunkSize must be greater than 0"));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SessionState::default());

        let worker = Worker {
            state: state.clone(),
            engine,
            fs: fs.clone(),
            timeouts: config.timeouts.clone(),
            chunk_size: config.chunk_size,
        };
        let handle = worker.spawn(runtime, rx)?;

        Ok(Self {
            credentials: Mutex::new(config.credentials.clone()),
            config,
            fs,
            state,
            sender: Some(tx),
            worker: Some(handle),
        })
    }

    pub fn config(&self) -> &FtpClientConfig {
        &self.config
    }

    // ─── Credentials ─────────────────────────────────────────────

    /// Replace the stored `user:password`. Returns `false` if it does not
    /// parse.
    pub fn set_credentials(&self, userpwd: &str) -> bool {
        match Credentials::parse(userpwd) {
            Some(c) => {
                *self.lock_credentials() = c;
                true
            }
            None => {
                log::warn!("Ignoring malformed FTP credentials");
                false
            }
        }
    }

    pub fn credentials(&self) -> Credentials {
        self.lock_credentials().clone()
    }

    // ─── Observers ───────────────────────────────────────────────

    /// The registry keeps a weak reference; dropping the last `Arc`
    /// unregisters implicitly.
    pub fn register_observer<O>(&self, observer: &Arc<O>) -> bool
    where
        O: ProgressObserver + 'static,
    {
        self.state.observers.register(observer)
    }

    pub fn unregister_observer<O>(&self, observer: &Arc<O>) -> bool
    where
        O: ProgressObserver + 'static,
    {
        self.state.observers.unregister(observer)
    }

    /// [`register_observer`](Self::register_observer) for callers holding
    /// `Arc<dyn ProgressObserver>`.
    pub fn register_shared_observer(&self, observer: &Arc<dyn ProgressObserver>) -> bool {
        self.state.observers.register_shared(observer)
    }

    pub fn unregister_shared_observer(&self, observer: &Arc<dyn ProgressObserver>) -> bool {
        self.state.observers.unregister_shared(observer)
    }

    // ─── Async starts ────────────────────────────────────────────

    /// Upload one local file to a full `ftp://` URL.
    pub fn upload_file_async(
        &self,
        remote_path: &str,
        local_path: &str,
        credentials: Option<&str>,
    ) -> bool {
        if remote_path.is_empty() {
            log::warn!("Upload rejected: empty remote path");
            return false;
        }
        if !self.fs.is_file(local_path) {
            log::warn!("Upload rejected: '{}' is not a regular file", local_path);
            return false;
        }
        let Some(credentials) = self.resolve_credentials(credentials) else {
            return false;
        };
        let total_bytes = match self.fs.file_size(local_path) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("Upload rejected: cannot stat '{}': {}", local_path, e);
                return false;
            }
        };

        let queue = TaskQueue::single(TransferTask::new(remote_path, local_path));
        self.start_session(SessionJob::Upload { queue, total_bytes }, credentials)
    }

    /// Upload the regular files directly inside `local_dir` to
    /// `remote_dir/<name>`, optionally filtered by extension.
    pub fn upload_directory_async(
        &self,
        remote_dir: &str,
        local_dir: &str,
        filter: Option<&ExtensionFilter>,
        credentials: Option<&str>,
    ) -> bool {
        if remote_dir.is_empty() {
            log::warn!("Directory upload rejected: empty remote directory");
            return false;
        }
        let Some(credentials) = self.resolve_credentials(credentials) else {
            return false;
        };
        let plan = match plan_directory_upload(self.fs.as_ref(), remote_dir, local_dir, filter) {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("Directory upload rejected: {}", e);
                return false;
            }
        };
        log::debug!(
            "Planned {} file(s), {} bytes from {}",
            plan.queue.len(),
            plan.total_bytes,
            local_dir
        );

        self.start_session(
            SessionJob::Upload {
                queue: plan.queue,
                total_bytes: plan.total_bytes,
            },
            credentials,
        )
    }

    pub fn upload_directory_all_files_async(
        &self,
        remote_dir: &str,
        local_dir: &str,
        credentials: Option<&str>,
    ) -> bool {
        self.upload_directory_async(remote_dir, local_dir, None, credentials)
    }

    /// Upload only files whose extension is in `extensions`.
    pub fn upload_directory_matched_files_async<I, S>(
        &self,
        remote_dir: &str,
        local_dir: &str,
        extensions: I,
        credentials: Option<&str>,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filter = ExtensionFilter::allow(extensions);
        self.upload_directory_async(remote_dir, local_dir, Some(&filter), credentials)
    }

    /// Download a full `ftp://` URL to `local_path`. Missing parent
    /// directories are created by the worker.
    pub fn download_file_async(
        &self,
        remote_path: &str,
        local_path: &str,
        credentials: Option<&str>,
    ) -> bool {
        if remote_path.is_empty() || local_path.is_empty() {
            log::warn!("Download rejected: empty remote or local path");
            return false;
        }
        let Some(credentials) = self.resolve_credentials(credentials) else {
            return false;
        };
        let task = TransferTask::new(remote_path, local_path);
        self.start_session(SessionJob::Download { task }, credentials)
    }

    // ─── Sync wrappers ───────────────────────────────────────────

    pub fn upload_file_sync(
        &self,
        remote_path: &str,
        local_path: &str,
        credentials: Option<&str>,
    ) -> bool {
        self.upload_file_async(remote_path, local_path, credentials) && self.await_result()
    }

    pub fn download_file_sync(
        &self,
        remote_path: &str,
        local_path: &str,
        credentials: Option<&str>,
    ) -> bool {
        self.download_file_async(remote_path, local_path, credentials) && self.await_result()
    }

    pub fn upload_directory_sync(
        &self,
        remote_dir: &str,
        local_dir: &str,
        filter: Option<&ExtensionFilter>,
        credentials: Option<&str>,
    ) -> bool {
        self.upload_directory_async(remote_dir, local_dir, filter, credentials)
            && self.await_result()
    }

    // ─── Session control ─────────────────────────────────────────

    /// Block until no session is running, then return the last stored
    /// result (`false` if no session has ever completed).
    pub fn await_result(&self) -> bool {
        self.state.flag.wait_while(true);
        self.state.last_result()
    }

    /// Ask the running session to stop. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        if !self.state.flag.load() {
            return false;
        }
        self.state.progress.request_cancel();
        log::info!("FTP transfer cancellation requested");
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.flag.load()
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.state.mode()
    }

    /// Progress of the running session, `None` when idle.
    pub fn current_progress(&self) -> Option<ProgressSnapshot> {
        if !self.state.flag.load() {
            return None;
        }
        Some(self.state.progress.snapshot())
    }

    pub fn last_session(&self) -> Option<SessionSummary> {
        self.state.last_session()
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Parse an optional `user:password` override; `None` means reject.
    fn resolve_credentials(&self, raw: Option<&str>) -> Option<Option<Credentials>> {
        match raw {
            None => Some(None),
            Some(s) => match Credentials::parse(s) {
                Some(c) => Some(Some(c)),
                None => {
                    log::warn!("Transfer rejected: malformed credentials");
                    None
                }
            },
        }
    }

    fn start_session(&self, job: SessionJob, credentials: Option<Credentials>) -> bool {
        let (swapped, _) = self.state.flag.compare_and_swap(false, true);
        if !swapped {
            log::warn!("FTP transfer rejected: a session is already running");
            return false;
        }

        if let Some(c) = credentials {
            *self.lock_credentials() = c;
        }

        let plan = SessionPlan {
            id: Uuid::new_v4().to_string(),
            credentials: self.credentials(),
            started_at: Utc::now(),
            job,
        };
        self.state.begin(plan.mode(), plan.initial_total());

        let Some(sender) = self.sender.as_ref() else {
            self.state.abandon();
            return false;
        };
        if let Err(e) = sender.send(plan) {
            log::error!("FTP transfer worker is gone: {}", e);
            self.state.abandon();
            return false;
        }
        true
    }

    fn lock_credentials(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.credentials.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FtpClient {
    /// How long `drop` waits for a cancelled session to wind down: one
    /// connect, one reply and one low-speed window, plus a second of slack.
    fn shutdown_grace(&self) -> Duration {
        let t = &self.config.timeouts;
        t.connect() + t.response() + t.low_speed_window() + Duration::from_secs(1)
    }
}

impl Drop for FtpClient {
    fn drop(&mut self) {
        self.cancel();
        let grace = self.shutdown_grace();
        let stopped = self.state.flag.wait_while_timeout(true, grace);
        self.sender.take();
        if !stopped {
            log::error!(
                "FTP transfer worker ignored cancellation for {:?}; detaching it",
                grace
            );
            self.worker.take();
            return;
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("FTP transfer worker panicked during shutdown");
            }
        }
    }
}
