//! # buddy-core
//!
//! Core library for buddy - a desktop companion that reacts to what an AI
//! coding assistant is doing.
//!
//! This library provides:
//! - Incremental tailing of Claude Code transcript files
//! - Detectors for activity state, mood, flow and eureka moments
//! - Session statistics
//! - A tokio runtime that ties a directory watch to the detectors
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Ingest:** [`LogTailer`] hands out newly appended lines, which
//!   [`ingest::parse_line`] turns into [`TranscriptEntry`] values
//! - **Detect:** [`Detector`] feeds each entry to every detector and buffers
//!   the resulting [`PetEvent`]s
//! - **Deliver:** [`runtime::spawn`] drives the detector from filesystem
//!   events and timer deadlines, sending events down a channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use buddy_core::Config;
//!
//! # async fn run() -> buddy_core::Result<()> {
//! let config = Config::load()?;
//! let root = config.watch.resolved_logs_path();
//!
//! let (handle, mut events) = buddy_core::runtime::spawn(&root, &config)?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! let summary = handle.stop().await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use detect::Detector;
pub use error::{Error, Result};
pub use ingest::{LogTailer, TranscriptEntry};
pub use replay::{replay, TimedEvent};
pub use runtime::WatchHandle;
pub use stats::{SessionStats, StatsSummary};
pub use types::*;

// Public modules
pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod replay;
pub mod runtime;
pub mod stats;
pub mod types;
