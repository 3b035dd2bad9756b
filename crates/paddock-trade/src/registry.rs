//! Client registry — the set of authenticated exchange sessions.
//!
//! Clients are registered once during setup and never removed
//! (single-session-per-process model). Registration is keyed by
//! `(exchange, username)`; session lifecycle operations broadcast to every
//! client in registration order, best-effort: one client failing never stops
//! the loop, and all per-client outcomes are collected into a
//! [`BroadcastReport`] for the caller.

use std::sync::Arc;

use ahash::AHashMap;
use paddock_core::{ExchangeKind, PaddockError};
use tracing::{info, warn};

use crate::{ClientSummary, ExchangeClient};

/// Session operation broadcast across the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Login,
    KeepAlive,
    Logout,
    UpdateAccountDetails,
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::KeepAlive => write!(f, "keep alive"),
            Self::Logout => write!(f, "logout"),
            Self::UpdateAccountDetails => write!(f, "update account details"),
        }
    }
}

/// Per-client outcomes of one broadcast operation.
#[derive(Debug)]
pub struct BroadcastReport {
    pub op: SessionOp,
    pub outcomes: Vec<(ClientSummary, Result<(), PaddockError>)>,
}

impl BroadcastReport {
    /// Clients whose operation failed, with the error.
    pub fn failures(&self) -> impl Iterator<Item = (&ClientSummary, &PaddockError)> {
        self.outcomes
            .iter()
            .filter_map(|(summary, result)| result.as_ref().err().map(|e| (summary, e)))
    }

    /// Whether every client succeeded (vacuously true when empty).
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|(_, result)| result.is_ok())
    }

    /// Whether at least one client succeeded.
    pub fn any_ok(&self) -> bool {
        self.outcomes.iter().any(|(_, result)| result.is_ok())
    }
}

/// Registry of exchange clients, indexed by `(exchange, username)`.
pub struct ClientRegistry {
    /// All clients in registration order.
    clients: Vec<Arc<dyn ExchangeClient>>,
    /// Lookup structure: exchange → username → client. Seeded with every
    /// supported exchange kind so an unsupported kind is rejected outright.
    by_exchange: AHashMap<ExchangeKind, AHashMap<String, Arc<dyn ExchangeClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        let mut by_exchange = AHashMap::new();
        for kind in ExchangeKind::SUPPORTED {
            by_exchange.insert(kind, AHashMap::new());
        }
        Self {
            clients: Vec::new(),
            by_exchange,
        }
    }

    /// Register a client.
    ///
    /// Rejects the identical client object, a second client with the same
    /// `(exchange, username)` identity, and unsupported exchange kinds. On
    /// rejection the registry is left unchanged.
    pub fn add(&mut self, client: Arc<dyn ExchangeClient>) -> Result<(), PaddockError> {
        if self.clients.iter().any(|c| Arc::ptr_eq(c, &client)) {
            return Err(PaddockError::DuplicateClient(format!(
                "client already present: {}",
                client.summary(),
            )));
        }

        let per_exchange = self
            .by_exchange
            .get_mut(&client.exchange())
            .ok_or_else(|| PaddockError::UnknownExchange(client.exchange().to_string()))?;

        if per_exchange.contains_key(client.username()) {
            return Err(PaddockError::DuplicateClient(format!(
                "username already registered: {}",
                client.summary(),
            )));
        }

        per_exchange.insert(client.username().to_string(), Arc::clone(&client));
        info!("[clients] added {}", client.summary());
        self.clients.push(client);
        Ok(())
    }

    /// Resolve the client servicing a given account, if registered.
    pub fn get(&self, exchange: ExchangeKind, username: &str) -> Option<Arc<dyn ExchangeClient>> {
        self.by_exchange
            .get(&exchange)
            .and_then(|per| per.get(username))
            .cloned()
    }

    /// True iff any registered client routes to the simulator (simulated
    /// venue or paper-trade flag). False for an empty registry.
    pub fn simulated(&self) -> bool {
        self.clients.iter().any(|c| c.is_simulated())
    }

    /// Nested identity summary: exchange → username → client summary.
    pub fn summary(&self) -> AHashMap<ExchangeKind, AHashMap<String, ClientSummary>> {
        self.by_exchange
            .iter()
            .map(|(kind, per)| {
                let summaries = per
                    .iter()
                    .map(|(username, client)| (username.clone(), client.summary()))
                    .collect();
                (*kind, summaries)
            })
            .collect()
    }

    pub async fn login(&self) -> BroadcastReport {
        self.broadcast(SessionOp::Login).await
    }

    pub async fn keep_alive(&self) -> BroadcastReport {
        self.broadcast(SessionOp::KeepAlive).await
    }

    pub async fn logout(&self) -> BroadcastReport {
        self.broadcast(SessionOp::Logout).await
    }

    pub async fn update_account_details(&self) -> BroadcastReport {
        self.broadcast(SessionOp::UpdateAccountDetails).await
    }

    /// Invoke one session operation on every client, in registration order.
    /// A failure is logged and collected; the loop never aborts early.
    async fn broadcast(&self, op: SessionOp) -> BroadcastReport {
        let mut outcomes = Vec::with_capacity(self.clients.len());
        for client in &self.clients {
            let result = match op {
                SessionOp::Login => client.login().await,
                SessionOp::KeepAlive => client.keep_alive().await,
                SessionOp::Logout => client.logout().await,
                SessionOp::UpdateAccountDetails => client.update_account_details().await,
            };
            match &result {
                Ok(()) => info!("[clients] {op}: {}", client.summary()),
                Err(e) => warn!("[clients] {op} failed for {}: {e}", client.summary()),
            }
            outcomes.push((client.summary(), result));
        }
        BroadcastReport { op, outcomes }
    }

    /// Iterate clients in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ExchangeClient>> {
        self.clients.iter()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedClient;
    use async_trait::async_trait;

    /// Stub live client with a configurable paper-trade flag and an
    /// operation that can be made to fail.
    struct StubClient {
        exchange: ExchangeKind,
        username: String,
        paper_trade: bool,
        fail_login: bool,
    }

    impl StubClient {
        fn live(username: &str) -> Self {
            Self {
                exchange: ExchangeKind::Betfair,
                username: username.to_string(),
                paper_trade: false,
                fail_login: false,
            }
        }
    }

    #[async_trait]
    impl ExchangeClient for StubClient {
        fn exchange(&self) -> ExchangeKind {
            self.exchange
        }

        fn username(&self) -> &str {
            &self.username
        }

        fn paper_trade(&self) -> bool {
            self.paper_trade
        }

        async fn login(&self) -> Result<(), PaddockError> {
            if self.fail_login {
                Err(PaddockError::Client("session rejected".into()))
            } else {
                Ok(())
            }
        }

        async fn keep_alive(&self) -> Result<(), PaddockError> {
            Ok(())
        }

        async fn logout(&self) -> Result<(), PaddockError> {
            Ok(())
        }

        async fn update_account_details(&self) -> Result<(), PaddockError> {
            Ok(())
        }
    }

    #[test]
    fn add_rejects_identical_client_object() {
        let mut registry = ClientRegistry::new();
        let client: Arc<dyn ExchangeClient> = Arc::new(StubClient::live("acct"));

        registry.add(Arc::clone(&client)).unwrap();
        let err = registry.add(client).unwrap_err();
        assert!(matches!(err, PaddockError::DuplicateClient(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_rejects_identity_collision() {
        let mut registry = ClientRegistry::new();
        registry.add(Arc::new(StubClient::live("acct"))).unwrap();

        let err = registry.add(Arc::new(StubClient::live("acct"))).unwrap_err();
        assert!(matches!(err, PaddockError::DuplicateClient(_)));
        assert_eq!(registry.len(), 1);

        // Same username on another venue is a different identity.
        registry.add(Arc::new(SimulatedClient::new("acct"))).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn get_resolves_by_identity() {
        let mut registry = ClientRegistry::new();
        registry.add(Arc::new(StubClient::live("acct"))).unwrap();

        let found = registry.get(ExchangeKind::Betfair, "acct").unwrap();
        assert_eq!(found.username(), "acct");
        assert!(registry.get(ExchangeKind::Betfair, "other").is_none());
        assert!(registry.get(ExchangeKind::Simulated, "acct").is_none());
    }

    #[test]
    fn simulated_is_derived_from_any_client() {
        let mut registry = ClientRegistry::new();
        assert!(!registry.simulated());

        registry.add(Arc::new(StubClient::live("live1"))).unwrap();
        assert!(!registry.simulated());

        registry.add(Arc::new(SimulatedClient::new("paper1"))).unwrap();
        assert!(registry.simulated());
    }

    #[test]
    fn paper_trade_flag_counts_as_simulated() {
        let mut registry = ClientRegistry::new();
        let mut client = StubClient::live("acct");
        client.paper_trade = true;
        registry.add(Arc::new(client)).unwrap();
        assert!(registry.simulated());
    }

    #[tokio::test]
    async fn broadcast_continues_past_a_failing_client() {
        let mut registry = ClientRegistry::new();
        let mut failing = StubClient::live("bad");
        failing.fail_login = true;
        registry.add(Arc::new(failing)).unwrap();
        registry.add(Arc::new(SimulatedClient::new("good"))).unwrap();

        let report = registry.login().await;
        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.all_ok());
        assert!(report.any_ok());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.username, "bad");
    }

    #[test]
    fn summary_nests_by_exchange_and_username() {
        let mut registry = ClientRegistry::new();
        registry.add(Arc::new(StubClient::live("acct"))).unwrap();
        registry.add(Arc::new(SimulatedClient::new("paper1"))).unwrap();

        let summary = registry.summary();
        assert_eq!(summary[&ExchangeKind::Betfair]["acct"].username, "acct");
        assert_eq!(summary[&ExchangeKind::Simulated]["paper1"].username, "paper1");
        assert!(summary[&ExchangeKind::BetConnect].is_empty());
    }

    #[test]
    fn iteration_preserves_registration_order() {
        let mut registry = ClientRegistry::new();
        registry.add(Arc::new(StubClient::live("a"))).unwrap();
        registry.add(Arc::new(SimulatedClient::new("b"))).unwrap();

        let usernames: Vec<&str> = registry.iter().map(|c| c.username()).collect();
        assert_eq!(usernames, vec!["a", "b"]);
    }
}
