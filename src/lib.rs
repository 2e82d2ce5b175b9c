//! # HashLog
//!
//! A single-file, append-only, log-structured key-value storage engine with:
//! - One data file of block-padded, checksummed records
//! - An in-memory hash index holding each key's latest location
//! - Truncate-based rollback of failed appends
//! - Index rebuild (and torn-tail repair) by replaying the log on open
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Embedding Process                       │
//! │                put / get / remove / path                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Data File  │          │ IndexTable  │
//!   │  (Append)   │          │  (RwLock)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │   Record    │
//!   │   Codec     │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hashlog::{Config, Engine};
//!
//! let engine = Engine::open(Config::builder().path("/tmp/demo.data").build())?;
//! engine.put(b"hello", b"world")?;
//! assert_eq!(engine.get(b"hello")?, b"world".to_vec());
//! engine.remove(b"hello")?;
//! assert!(engine.get(b"hello").unwrap_err().is_not_found());
//! # Ok::<(), hashlog::HashLogError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod index;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HashLogError, Result};
pub use config::{Compression, Config, RecoveryMode, SyncStrategy};
pub use engine::{Engine, EngineStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HashLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
