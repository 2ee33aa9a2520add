//! # Core Module
//!
//! Session construction and the crate-boundary API. The context wires
//! the cache, queue, subscriptions, and connectivity monitor; consumers
//! depend on the context they are handed, never on a global.

pub mod config;
pub mod context;
pub mod error;

pub use config::SyncConfig;
pub use context::SyncContext;
pub use error::{SyncError, SyncResult};
