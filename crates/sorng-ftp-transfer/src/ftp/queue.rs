//! FIFO of upload tasks for one session, plus the directory planner that
//! fills it.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::fs::Filesystem;
use crate::ftp::types::{ExtensionFilter, TransferTask};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::VecDeque;
use std::path::Path;

/// Bytes escaped when a local file name becomes one URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Ordered upload tasks, consumed strictly front-to-back.
#[derive(Debug, Default, Clone)]
pub struct TaskQueue {
    tasks: VecDeque<TransferTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(task: TransferTask) -> Self {
        let mut q = Self::new();
        q.enqueue(task);
        q
    }

    pub fn enqueue(&mut self, task: TransferTask) {
        self.tasks.push_back(task);
    }

    pub fn pop_front(&mut self) -> Option<TransferTask> {
        self.tasks.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferTask> {
        self.tasks.iter()
    }
}

/// A directory upload ready to hand to the worker.
#[derive(Debug)]
pub struct UploadPlan {
    pub queue: TaskQueue,
    /// Sum of every queued file's size.
    pub total_bytes: u64,
}

/// Make sure a remote directory URL ends with `/`.
pub fn normalize_remote_dir(remote_dir: &str) -> String {
    if remote_dir.ends_with('/') {
        remote_dir.to_string()
    } else {
        format!("{}/", remote_dir)
    }
}

/// Pair every regular file directly inside `local_dir` (optionally filtered)
/// with `remote_dir/<file name>`. The name is percent-encoded so it parses
/// back to exactly the local file name on the server side.
///
/// Fails if `local_dir` is not a directory or nothing is selected.
pub fn plan_directory_upload(
    fs: &dyn Filesystem,
    remote_dir: &str,
    local_dir: &str,
    filter: Option<&ExtensionFilter>,
) -> FtpResult<UploadPlan> {
    if !fs.is_dir(local_dir) {
        return Err(FtpError::not_found(format!(
            "'{}' is not a directory",
            local_dir
        )));
    }

    let prefix = normalize_remote_dir(remote_dir);
    let mut queue = TaskQueue::new();
    let mut total_bytes = 0u64;

    for entry in fs.list_files(local_dir)? {
        if let Some(f) = filter {
            if !f.matches(Path::new(&entry.path)) {
                continue;
            }
        }
        let name = fs.file_name(&entry.path);
        let remote = format!("{}{}", prefix, utf8_percent_encode(&name, PATH_SEGMENT));
        total_bytes += entry.size;
        queue.enqueue(TransferTask::new(remote, entry.path));
    }

    if queue.is_empty() {
        return Err(FtpError::not_found(format!(
            "No files to upload in '{}'",
            local_dir
        )));
    }

    Ok(UploadPlan { queue, total_bytes })
}
