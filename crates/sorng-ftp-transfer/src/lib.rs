//! # SortOfRemote NG – FTP Transfer
//!
//! Background FTP transfer client providing:
//!   • Single-file upload and download over plain FTP
//!   • Flat directory uploads with extension allow/deny filters
//!   • One session at a time, rejected (never queued) while busy
//!   • Async start plus blocking `await_result`, and sync wrappers
//!   • Progress observers and cooperative cancellation
//!   • Remote size pre-flight and stall/low-speed aborts

pub mod ftp;
