//! Session worker: the background thread that drains one session at a time.
//!
//! The facade hands over a [`SessionPlan`] through an unbounded channel; the
//! worker owns a current-thread tokio runtime and drives the engine for each
//! task, binding [`UploadHooks`] or [`DownloadHooks`] to the session's
//! progress state and observer registry.

use crate::ftp::config::TransferTimeouts;
use crate::ftp::engine::{TransferEngine, TransferHooks, TransferRequest};
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::flag::AtomicFlag;
use crate::ftp::fs::Filesystem;
use crate::ftp::observer::ObserverRegistry;
use crate::ftp::progress::ProgressState;
use crate::ftp::queue::TaskQueue;
use crate::ftp::types::{
    Credentials, OperationMode, SessionSummary, TransferDirection, TransferTask,
};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

pub(crate) const WORKER_THREAD_NAME: &str = "ftp-transfer-worker";

// ─── Shared session state ────────────────────────────────────────────

/// Everything the facade and the worker both touch.
#[derive(Default)]
pub(crate) struct SessionState {
    pub flag: AtomicFlag,
    pub progress: ProgressState,
    pub observers: ObserverRegistry,
    mode: Mutex<OperationMode>,
    last_result: Mutex<bool>,
    last_session: Mutex<Option<SessionSummary>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    /// Prepare for a session already admitted by the flag.
    pub fn begin(&self, mode: OperationMode, total_bytes: u64) {
        self.progress.reset();
        self.progress.set_total(total_bytes);
        *lock(&self.mode) = mode;
    }

    /// Publish the outcome, then release the flag. Waiters woken by the
    /// flag always see this session's result.
    pub fn finish(&self, summary: SessionSummary) {
        *lock(&self.last_result) = summary.succeeded;
        *lock(&self.last_session) = Some(summary);
        *lock(&self.mode) = OperationMode::None;
        self.flag.store(false);
    }

    /// Undo [`begin`](Self::begin) for a session that never reached the
    /// worker.
    pub fn abandon(&self) {
        *lock(&self.mode) = OperationMode::None;
        self.flag.store(false);
    }

    pub fn mode(&self) -> OperationMode {
        *lock(&self.mode)
    }

    pub fn last_result(&self) -> bool {
        *lock(&self.last_result)
    }

    pub fn last_session(&self) -> Option<SessionSummary> {
        lock(&self.last_session).clone()
    }
}

// ─── Session plans ───────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) enum SessionJob {
    Upload { queue: TaskQueue, total_bytes: u64 },
    Download { task: TransferTask },
}

/// One admitted session, moved to the worker in full.
#[derive(Debug)]
pub(crate) struct SessionPlan {
    pub id: String,
    pub credentials: Credentials,
    pub started_at: DateTime<Utc>,
    pub job: SessionJob,
}

impl SessionPlan {
    pub fn mode(&self) -> OperationMode {
        match self.job {
            SessionJob::Upload { .. } => OperationMode::Upload,
            SessionJob::Download { .. } => OperationMode::Download,
        }
    }

    /// Bytes expected before the worker starts; downloads learn theirs from
    /// the size query.
    pub fn initial_total(&self) -> u64 {
        match self.job {
            SessionJob::Upload { total_bytes, .. } => total_bytes,
            SessionJob::Download { .. } => 0,
        }
    }

    fn task_count(&self) -> usize {
        match &self.job {
            SessionJob::Upload { queue, .. } => queue.len(),
            SessionJob::Download { .. } => 1,
        }
    }
}

struct Outcome {
    succeeded: bool,
    tasks_completed: usize,
}

// ─── Hooks ───────────────────────────────────────────────────────────

/// Feeds a local file to the engine and counts every byte read.
pub(crate) struct UploadHooks<'a> {
    file: File,
    progress: &'a ProgressState,
    observers: &'a ObserverRegistry,
}

impl TransferHooks for UploadHooks<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        if n > 0 {
            self.progress.record_read(n as u64);
            self.observers.dispatch_upload(self.progress);
        }
        Ok(n)
    }

    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "upload session received download data",
        ))
    }

    fn keep_going(&mut self) -> bool {
        !self.progress.is_cancel_requested()
    }
}

/// Writes downloaded bytes to a local file and records the absolute offset.
pub(crate) struct DownloadHooks<'a> {
    file: File,
    written: u64,
    progress: &'a ProgressState,
    observers: &'a ObserverRegistry,
}

impl TransferHooks for DownloadHooks<'_> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "download session asked for upload data",
        ))
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        self.progress.record_written(self.written);
        self.observers.dispatch_download(self.progress);
        Ok(data.len())
    }

    fn keep_going(&mut self) -> bool {
        !self.progress.is_cancel_requested()
    }
}

// ─── Worker ──────────────────────────────────────────────────────────

pub(crate) struct Worker {
    pub state: Arc<SessionState>,
    pub engine: Arc<dyn TransferEngine>,
    pub fs: Arc<dyn Filesystem>,
    pub timeouts: TransferTimeouts,
    pub chunk_size: usize,
}

impl Worker {
    /// Start the worker thread. It exits once every sender is dropped.
    pub fn spawn(
        self,
        runtime: Runtime,
        rx: UnboundedReceiver<SessionPlan>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || self.run(runtime, rx))
    }

    fn run(self, runtime: Runtime, mut rx: UnboundedReceiver<SessionPlan>) {
        while let Some(plan) = runtime.block_on(rx.recv()) {
            let id = plan.id.clone();
            let mode = plan.mode();
            let started_at = plan.started_at;
            let tasks_total = plan.task_count();

            let run = catch_unwind(AssertUnwindSafe(|| runtime.block_on(self.execute(plan))));
            let outcome = match run {
                Ok(outcome) => outcome,
                Err(_) => {
                    log::error!("FTP session {} panicked; marking it failed", id);
                    Outcome {
                        succeeded: false,
                        tasks_completed: 0,
                    }
                }
            };

            let summary = SessionSummary {
                id,
                mode,
                started_at,
                finished_at: Utc::now(),
                tasks_total,
                tasks_completed: outcome.tasks_completed,
                succeeded: outcome.succeeded,
            };
            log::info!(
                "FTP session {} finished: {} ({}/{} tasks)",
                summary.id,
                if summary.succeeded { "ok" } else { "failed" },
                summary.tasks_completed,
                summary.tasks_total
            );
            self.state.finish(summary);
        }
        log::debug!("FTP transfer worker exiting");
    }

    async fn execute(&self, plan: SessionPlan) -> Outcome {
        log::info!("FTP session {} started ({:?})", plan.id, plan.mode());
        match plan.job {
            SessionJob::Upload { queue, .. } => self.run_uploads(&plan.credentials, queue).await,
            SessionJob::Download { task } => {
                match self.download(&plan.credentials, &task).await {
                    Ok(bytes) => {
                        log::debug!("Downloaded {} ({} bytes)", task.remote_path, bytes);
                        Outcome {
                            succeeded: true,
                            tasks_completed: 1,
                        }
                    }
                    Err(e) if e.is_cancelled() => {
                        log::info!("Download of {} cancelled", task.remote_path);
                        Outcome {
                            succeeded: false,
                            tasks_completed: 0,
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "Download of {} to {} failed: {}",
                            task.remote_path,
                            task.local_path,
                            e
                        );
                        Outcome {
                            succeeded: false,
                            tasks_completed: 0,
                        }
                    }
                }
            }
        }
    }

    async fn run_uploads(&self, credentials: &Credentials, mut queue: TaskQueue) -> Outcome {
        let mut completed = 0;

        while let Some(task) = queue.pop_front() {
            let result = if self.state.progress.is_cancel_requested() {
                Err(FtpError::cancelled("Cancelled before task start"))
            } else {
                self.upload(credentials, &task).await
            };

            match result {
                Ok(bytes) => {
                    completed += 1;
                    log::debug!(
                        "Uploaded {} to {} ({} bytes)",
                        task.local_path,
                        task.remote_path,
                        bytes
                    );
                }
                Err(e) => {
                    if e.is_cancelled() {
                        log::info!(
                            "Upload of {} cancelled; dropping {} queued task(s)",
                            task.local_path,
                            queue.len()
                        );
                    } else {
                        log::warn!(
                            "Upload of {} to {} failed: {}; dropping {} queued task(s)",
                            task.local_path,
                            task.remote_path,
                            e,
                            queue.len()
                        );
                    }
                    queue.clear();
                    return Outcome {
                        succeeded: false,
                        tasks_completed: completed,
                    };
                }
            }
        }

        Outcome {
            succeeded: true,
            tasks_completed: completed,
        }
    }

    async fn upload(&self, credentials: &Credentials, task: &TransferTask) -> FtpResult<u64> {
        let file = File::open(&task.local_path)?;
        self.state
            .progress
            .begin_file(&self.fs.file_name(&task.local_path));

        let mut hooks = UploadHooks {
            file,
            progress: &self.state.progress,
            observers: &self.state.observers,
        };
        let request = self.request(&task.remote_path, credentials, TransferDirection::Upload);
        self.engine.perform(request, &mut hooks).await
    }

    async fn download(&self, credentials: &Credentials, task: &TransferTask) -> FtpResult<u64> {
        self.state
            .progress
            .begin_file(&self.fs.file_name(&task.local_path));
        if self.state.progress.is_cancel_requested() {
            return Err(FtpError::cancelled("Cancelled before task start"));
        }

        // ── Pre-flight size query ────────────────────────────────
        let size = self
            .engine
            .head_size(&task.remote_path, credentials, &self.timeouts)
            .await?;
        if size == 0 {
            return Err(FtpError::not_found(format!(
                "Remote file {} reports no size",
                task.remote_path
            )));
        }
        self.state.progress.set_total(size);

        // ── Local target ─────────────────────────────────────────
        if let Some(parent) = Path::new(&task.local_path).parent() {
            self.fs.create_dir_all(&parent.to_string_lossy())?;
        }
        let file = File::create(&task.local_path)?;

        let mut hooks = DownloadHooks {
            file,
            written: 0,
            progress: &self.state.progress,
            observers: &self.state.observers,
        };
        let request = self.request(&task.remote_path, credentials, TransferDirection::Download);
        let moved = self.engine.perform(request, &mut hooks).await?;
        hooks.file.flush()?;
        Ok(moved)
    }

    fn request<'a>(
        &'a self,
        url: &'a str,
        credentials: &'a Credentials,
        direction: TransferDirection,
    ) -> TransferRequest<'a> {
        TransferRequest {
            url,
            credentials,
            direction,
            timeouts: &self.timeouts,
            chunk_size: self.chunk_size,
        }
    }
}
