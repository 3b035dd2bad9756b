//! # paddock-trade
//!
//! Session and execution layer of the Paddock framework.
//!
//! ## Modules
//!
//! - [`registry`] — `ClientRegistry`: the set of authenticated exchange
//!   sessions, with best-effort lifecycle broadcast
//! - [`betfair`] — Betfair REST session client (login / keep-alive / logout)
//! - [`simulated`] — no-network client for simulated deployments
//! - [`execution`] — `ExecutionRouter` contract + live/simulated dispatch
//! - [`matching`] — in-memory matching engine behind the simulated router
//!
//! ## Lifecycle
//!
//! 1. Construct clients and [`registry::ClientRegistry::add`] each one.
//! 2. `registry.login()` to authenticate every session.
//! 3. Periodic `registry.keep_alive()` refreshes sessions without
//!    interrupting open feed subscriptions.
//! 4. `registry.logout()` at shutdown.

pub mod betfair;
pub mod execution;
pub mod matching;
pub mod registry;
pub mod simulated;

use async_trait::async_trait;
use paddock_core::{ExchangeKind, PaddockError};
use serde::Serialize;

/// One authenticated account on one exchange.
///
/// Implementations own their transport and credentials; the registry only
/// drives the lifecycle. All session operations take `&self` so a registered
/// client can be shared across tasks.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue this client connects to.
    fn exchange(&self) -> ExchangeKind;

    /// Account username; unique per venue within one registry.
    fn username(&self) -> &str;

    /// Whether a live account is running in paper-trade mode.
    fn paper_trade(&self) -> bool {
        false
    }

    /// Authenticate and obtain a session.
    async fn login(&self) -> Result<(), PaddockError>;

    /// Refresh the session before it expires. Must not interrupt open
    /// subscriptions authenticated against it.
    async fn keep_alive(&self) -> Result<(), PaddockError>;

    /// Invalidate the session.
    async fn logout(&self) -> Result<(), PaddockError>;

    /// Refresh cached account details (funds, exposure limits).
    async fn update_account_details(&self) -> Result<(), PaddockError>;

    /// Identity summary for logging and diagnostics.
    fn summary(&self) -> ClientSummary {
        ClientSummary {
            exchange: self.exchange(),
            username: self.username().to_string(),
            paper_trade: self.paper_trade(),
        }
    }

    /// Whether order flow from this client must route to the simulator.
    fn is_simulated(&self) -> bool {
        self.exchange() == ExchangeKind::Simulated || self.paper_trade()
    }
}

/// Identity summary of one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub exchange: ExchangeKind,
    pub username: String,
    pub paper_trade: bool,
}

impl std::fmt::Display for ClientSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.exchange, self.username)?;
        if self.paper_trade {
            write!(f, " (paper)")?;
        }
        Ok(())
    }
}
