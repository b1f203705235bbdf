//! # sorng-ftp-transfer: single-flight FTP transfer client
//!
//! Architecture:
//! - `types`: tasks, credentials, filters, snapshots, session summaries
//! - `error`: FTP-specific error type
//! - `config`: client configuration and transfer timeouts
//! - `flag`: mutex + condvar boolean guarding the single session
//! - `progress`: shared progress/cancel record
//! - `queue`: upload task FIFO and directory planner
//! - `observer`: progress observers and their weak registry
//! - `fs`: local filesystem seam (walkdir enumeration)
//! - `engine`: transfer engine trait and per-chunk hooks
//! - `protocol`: control-channel command/response codec
//! - `connection`: TCP connect, greeting, login
//! - `target`: `ftp://` URL parsing
//! - `data_channel`: PASV/EPSV/PORT negotiation
//! - `throughput`: low-speed abort
//! - `ftp_engine`: default engine over tokio sockets
//! - `worker`: background session thread
//! - `client`: public facade

pub mod types;
pub mod error;
pub mod config;
pub mod flag;
pub mod progress;
pub mod queue;
pub mod observer;
pub mod fs;
pub mod engine;
pub mod protocol;
pub mod connection;
pub mod target;
pub mod data_channel;
pub mod throughput;
pub mod ftp_engine;
mod worker;
pub mod client;

// Re-exports for lib.rs consumers
pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use config::{FtpClientConfig, TransferTimeouts};
pub use client::FtpClient;
pub use engine::{TransferEngine, TransferHooks, TransferRequest};
pub use fs::{Filesystem, LocalFileEntry, LocalFilesystem};
pub use ftp_engine::FtpEngine;
pub use observer::{ObserverRegistry, ProgressObserver};
