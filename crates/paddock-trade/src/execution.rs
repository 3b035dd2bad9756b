//! Execution routing — which engine services an order package.
//!
//! An [`ExecutionRouter`] accepts [`OrderPackage`]s and performs the four
//! order operations. Two implementations exist:
//!
//! - [`LiveRouter`] delegates to an [`OrderTransport`], the collaborator that
//!   owns the venue's order wire protocol;
//! - [`crate::matching::SimulatedRouter`] matches in memory against a book
//!   fed from processed stream output.
//!
//! [`router_for`] picks between them per package: a package is simulated iff
//! the client servicing its account is simulated (simulated venue or
//! paper-trade flag).

use async_trait::async_trait;
use paddock_core::{OrderPackage, PaddockError};

use crate::registry::ClientRegistry;

/// Shared HTTP session handle passed through to live order submission.
pub type HttpSession = reqwest::Client;

// ---------------------------------------------------------------------------
// Router contract
// ---------------------------------------------------------------------------

/// Services order packages for one execution mode.
///
/// Every instruction in a package shares the package's operation; routers
/// process instructions in order and fail on the first error.
#[async_trait]
pub trait ExecutionRouter: Send + Sync {
    async fn place(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError>;

    async fn cancel(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError>;

    async fn update(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError>;

    async fn replace(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError>;
}

// ---------------------------------------------------------------------------
// Live delegation
// ---------------------------------------------------------------------------

/// Venue order wire protocol, owned by the caller.
///
/// The framing and endpoint details live behind this contract; the live
/// router only forwards packages to it.
#[async_trait]
pub trait OrderTransport: Send + Sync {
    async fn submit(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError>;
}

/// Router for live accounts: every operation forwards the package to the
/// venue transport unchanged.
pub struct LiveRouter {
    transport: Box<dyn OrderTransport>,
}

impl LiveRouter {
    pub fn new(transport: Box<dyn OrderTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ExecutionRouter for LiveRouter {
    async fn place(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError> {
        self.transport.submit(package, session).await
    }

    async fn cancel(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError> {
        self.transport.submit(package, session).await
    }

    async fn update(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError> {
        self.transport.submit(package, session).await
    }

    async fn replace(
        &self,
        package: &OrderPackage,
        session: &HttpSession,
    ) -> Result<(), PaddockError> {
        self.transport.submit(package, session).await
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Which execution engine a package must route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterChoice {
    Live,
    Simulated,
}

/// Resolve the routing choice for a package from the client registry.
///
/// The package's `(exchange, username)` identity must match a registered
/// client; a package for an unknown account is an execution error.
pub fn router_for(
    registry: &ClientRegistry,
    package: &OrderPackage,
) -> Result<RouterChoice, PaddockError> {
    let (exchange, username) = package.account();
    let client = registry.get(exchange, username).ok_or_else(|| {
        PaddockError::Execution(format!("no client for {exchange}/{username}"))
    })?;

    if client.is_simulated() {
        Ok(RouterChoice::Simulated)
    } else {
        Ok(RouterChoice::Live)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use paddock_core::{ExchangeKind, OrderInstruction, PackageType, PersistenceType, Side};

    use super::*;
    use crate::ExchangeClient;
    use crate::simulated::SimulatedClient;

    fn package(exchange: ExchangeKind, username: &str) -> OrderPackage {
        OrderPackage {
            market_id: "1.234".into(),
            exchange,
            username: username.into(),
            strategy: "strat".into(),
            package_type: PackageType::Place,
            instructions: vec![OrderInstruction {
                bet_id: "b1".into(),
                selection_id: 7,
                side: Side::Back,
                price: 2.0,
                size: 10.0,
                persistence: PersistenceType::Lapse,
                new_price: None,
            }],
        }
    }

    struct CountingTransport {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OrderTransport for CountingTransport {
        async fn submit(
            &self,
            _package: &OrderPackage,
            _session: &HttpSession,
        ) -> Result<(), PaddockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct LiveStub {
        username: String,
        paper_trade: bool,
    }

    #[async_trait]
    impl ExchangeClient for LiveStub {
        fn exchange(&self) -> ExchangeKind {
            ExchangeKind::Betfair
        }

        fn username(&self) -> &str {
            &self.username
        }

        fn paper_trade(&self) -> bool {
            self.paper_trade
        }

        async fn login(&self) -> Result<(), PaddockError> {
            Ok(())
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

    #[tokio::test]
    async fn live_router_forwards_every_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = LiveRouter::new(Box::new(CountingTransport {
            calls: Arc::clone(&calls),
        }));
        let session = HttpSession::new();
        let pkg = package(ExchangeKind::Betfair, "acct");

        router.place(&pkg, &session).await.unwrap();
        router.cancel(&pkg, &session).await.unwrap();
        router.update(&pkg, &session).await.unwrap();
        router.replace(&pkg, &session).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn dispatch_follows_the_servicing_client() {
        let mut registry = ClientRegistry::new();
        registry
            .add(Arc::new(LiveStub {
                username: "live".into(),
                paper_trade: false,
            }))
            .unwrap();
        registry
            .add(Arc::new(LiveStub {
                username: "paper".into(),
                paper_trade: true,
            }))
            .unwrap();
        registry.add(Arc::new(SimulatedClient::new("sim"))).unwrap();

        let choice = router_for(&registry, &package(ExchangeKind::Betfair, "live")).unwrap();
        assert_eq!(choice, RouterChoice::Live);

        let choice = router_for(&registry, &package(ExchangeKind::Betfair, "paper")).unwrap();
        assert_eq!(choice, RouterChoice::Simulated);

        let choice = router_for(&registry, &package(ExchangeKind::Simulated, "sim")).unwrap();
        assert_eq!(choice, RouterChoice::Simulated);
    }

    #[test]
    fn dispatch_rejects_unknown_account() {
        let registry = ClientRegistry::new();
        let err = router_for(&registry, &package(ExchangeKind::Betfair, "ghost")).unwrap_err();
        assert!(matches!(err, PaddockError::Execution(_)));
    }
}
