//! Wire-transport collaborator contract.
//!
//! The actual exchange streaming protocol (framing, heartbeats, auth
//! handshake) lives in an external transport library. This module defines the
//! seam Paddock expects from it: open a subscription with a listener, get
//! back a closable connection handle, and have raw record batches pushed into
//! the listener's `process` call from the transport's worker.

use anyhow::Result;
use async_trait::async_trait;
use paddock_core::PaddockError;
use serde_json::Value;

use crate::StreamId;

/// Everything needed to open one feed subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    /// Id of the stream this subscription belongs to.
    pub stream_id: StreamId,
    /// Opaque market filter, forwarded verbatim.
    pub market_filter: Value,
    /// Opaque market-data field filter, forwarded verbatim.
    pub market_data_filter: Value,
    /// Feed inactivity timeout in seconds.
    pub streaming_timeout: f64,
    /// Minimum interval between delivered batches, in milliseconds.
    pub conflate_ms: u64,
}

/// Receives raw record batches from a transport worker.
///
/// Within one subscription, `process` is called strictly in arrival order
/// from a single worker; implementations therefore need no internal locking.
pub trait BatchListener: Send {
    /// Consume one batch of raw update records.
    ///
    /// An error is fatal for the batch and surfaces to the transport worker;
    /// records are never silently dropped.
    fn process(&mut self, records: &[Value], clock: u64) -> Result<(), PaddockError>;
}

/// An open feed connection. Closing is idempotent.
#[async_trait]
pub trait StreamConnection: Send {
    /// Instruct the transport to close the subscription. Does not block for
    /// drain completion.
    async fn close(&mut self) -> Result<()>;
}

/// Transport capable of opening authenticated feed subscriptions.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a market subscription configured by `spec`, delivering batches to
    /// `listener`. May block on network I/O until the subscription ack.
    async fn open_market_subscription(
        &self,
        spec: &SubscriptionSpec,
        listener: Box<dyn BatchListener>,
    ) -> Result<Box<dyn StreamConnection>>;
}
