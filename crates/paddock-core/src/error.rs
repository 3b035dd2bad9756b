//! Typed error definitions for the Paddock framework.
//!
//! Provides [`PaddockError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the Paddock framework.
#[derive(Debug, Error)]
pub enum PaddockError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// A client with the same identity (or the same underlying object) is
    /// already registered.
    #[error("duplicate client: {0}")]
    DuplicateClient(String),

    /// An exchange kind outside the supported set.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    /// The feed listener was asked to cache a subscription kind it does not
    /// support (notably order subscriptions).
    #[error("unsupported subscription: {0}")]
    UnsupportedSubscription(String),

    /// Session error from an exchange client (login, keep-alive, logout).
    #[error("client error: {0}")]
    Client(String),

    /// Stream transport connection or subscription error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed update record reaching the cache engine.
    #[error("listener error: {0}")]
    Listener(String),

    /// Order execution error (place, cancel, update, replace).
    #[error("execution error: {0}")]
    Execution(String),
}
