//! # paddock-core
//!
//! Core crate for the Paddock betting-exchange trading framework, providing:
//!
//! - **Types** (`types`) — exchange enums, order structs, fill reports
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `PaddockError` via thiserror
//! - **Time utilities** (`time_util`) — millisecond timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::PaddockError;
pub use types::*;
