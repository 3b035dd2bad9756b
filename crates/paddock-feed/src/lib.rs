//! # paddock-feed
//!
//! Streaming layer of the Paddock framework: subscription management, the
//! stream hierarchy, and the cache engine that turns raw delta batches into
//! cache-consistent output for the strategy layer.
//!
//! ## Architecture
//!
//! ```text
//! StreamManager.register(strategy) ──► reuse-or-create Stream (id ≥ 1000)
//! StreamManager.start()            ──► Stream.run() per stream
//!   MarketStream ──► raw book batches ──► output channel
//!   DataStream   ──► FeedListener (cache engine) ──► output channel
//! StreamManager.stop()             ──► Stream.stop() per stream
//! ```
//!
//! ## Modules
//!
//! - [`manager`] — `StreamManager`: dedup + lifecycle of subscriptions
//! - [`stream`] — `Stream` with the closed `StreamKind` set
//! - [`listener`] — `FeedListener` dispatcher + per-kind stream processors
//! - [`cache`] — per-entity delta-accumulated state
//! - [`transport`] — external wire-transport collaborator contract
//! - [`sim`] — in-process simulated feed for all-simulated deployments

pub mod cache;
pub mod listener;
pub mod manager;
pub mod sim;
pub mod stream;
pub mod transport;

use serde_json::Value;

/// Identifier of one managed stream. Allocated monotonically from 1000.
pub type StreamId = u64;

/// One batch of update records as forwarded to the strategy layer.
///
/// For a `MarketStream` the records are raw market books straight off the
/// transport; for a `DataStream` they are the raw delta records, forwarded
/// after the cache engine has applied them.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBatch {
    /// Unique id of the stream that produced the batch.
    pub stream_id: StreamId,
    /// Publish time (or transport clock) the batch arrived with.
    pub clock: u64,
    /// The original records, in arrival order.
    pub records: Vec<Value>,
}

/// Sending half of the processed-batch output channel.
pub type OutputSender = crossbeam_channel::Sender<StreamBatch>;

/// Receiving half of the processed-batch output channel, polled by the
/// strategy layer and the simulated execution engine.
pub type OutputReceiver = crossbeam_channel::Receiver<StreamBatch>;

/// A strategy's declared subscription requirements.
///
/// Two requests with equal fields map onto the same underlying stream; see
/// [`stream::Stream::matches`] for the comparison contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    /// Opaque descriptor of which markets to subscribe to.
    pub market_filter: Value,
    /// Opaque descriptor of which data fields to receive.
    pub market_data_filter: Value,
    /// Feed inactivity timeout in seconds.
    pub streaming_timeout: f64,
    /// Minimum interval between delivered batches, in milliseconds.
    pub conflate_ms: u64,
    /// Request the low-level cached data path instead of full market books.
    pub raw_data: bool,
    /// Subscription operation tag (`"marketSubscription"` or
    /// `"raceSubscription"`); only meaningful on the raw-data path.
    pub operation: String,
}

impl Default for SubscriptionRequest {
    fn default() -> Self {
        Self {
            market_filter: Value::Null,
            market_data_filter: Value::Null,
            streaming_timeout: 30.0,
            conflate_ms: 0,
            raw_data: false,
            operation: listener::MARKET_SUBSCRIPTION.to_string(),
        }
    }
}

/// Contract the strategy layer implements to receive stream assignments.
///
/// The manager reads the declared [`SubscriptionRequest`] and records the
/// selected stream id onto the strategy's stream list; one strategy may end
/// up subscribed to several streams.
pub trait Strategy: Send {
    /// Strategy label for logging and fill attribution.
    fn name(&self) -> &str;
    /// The subscription this strategy wants.
    fn subscription(&self) -> &SubscriptionRequest;
    /// Streams assigned to this strategy so far.
    fn streams_mut(&mut self) -> &mut Vec<StreamId>;
}
