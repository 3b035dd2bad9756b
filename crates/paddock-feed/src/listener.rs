//! Cache engine: feed listener dispatcher + per-kind stream processors.
//!
//! A [`FeedListener`] sits between the transport and the output channel on
//! the low-level data path. It selects the processor for its subscription
//! kind exactly once at construction:
//!
//! - `"marketSubscription"` → market processor, records keyed by `"id"`
//! - `"raceSubscription"` → race processor, records keyed by `"mid"`
//! - anything else (notably `"orderSubscription"`) is unsupported and fails
//!   construction — order-stream caching is not provided by this engine.
//!
//! The processor maintains one [`EntityCache`] per live entity, counts every
//! record consumed, and evicts a market's cache the same cycle its
//! `marketDefinition.status` goes `"CLOSED"` (process-then-evict, so the
//! final delta still lands before removal). Downstream always receives the
//! raw batch, exactly once per `process` call, after all records applied.

use ahash::AHashMap;
use paddock_core::PaddockError;
use serde_json::Value;
use tracing::debug;

use crate::cache::EntityCache;
use crate::transport::BatchListener;
use crate::{OutputSender, StreamBatch, StreamId};

/// Subscription tag handled by the market processor.
pub const MARKET_SUBSCRIPTION: &str = "marketSubscription";
/// Subscription tag handled by the race processor.
pub const RACE_SUBSCRIPTION: &str = "raceSubscription";

// ---------------------------------------------------------------------------
// Subscription kinds
// ---------------------------------------------------------------------------

/// The closed set of subscription kinds the cache engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Market delta updates, identified by `"id"`.
    Market,
    /// Race/meeting updates, identified by `"mid"`.
    Race,
}

impl SubscriptionKind {
    /// Parse a transport operation tag.
    pub fn parse(operation: &str) -> Result<Self, PaddockError> {
        match operation {
            MARKET_SUBSCRIPTION => Ok(Self::Market),
            RACE_SUBSCRIPTION => Ok(Self::Race),
            other => Err(PaddockError::UnsupportedSubscription(other.to_string())),
        }
    }

    /// The record field holding the entity identifier for this kind.
    pub fn lookup(self) -> &'static str {
        match self {
            Self::Market => "id",
            Self::Race => "mid",
        }
    }
}

// ---------------------------------------------------------------------------
// Stream processor
// ---------------------------------------------------------------------------

/// Per-kind stream processor: cache map + update counter + output hook.
#[derive(Debug)]
pub struct StreamProcessor {
    kind: SubscriptionKind,
    lookup: &'static str,
    stream_id: StreamId,
    caches: AHashMap<String, EntityCache>,
    updates_processed: u64,
    output: OutputSender,
}

impl StreamProcessor {
    fn new(kind: SubscriptionKind, stream_id: StreamId, output: OutputSender) -> Self {
        Self {
            kind,
            lookup: kind.lookup(),
            stream_id,
            caches: AHashMap::new(),
            updates_processed: 0,
            output,
        }
    }

    /// Apply one batch of raw delta records, in arrival order, then forward
    /// the raw batch downstream exactly once.
    pub fn process(&mut self, records: &[Value], clock: u64) -> Result<(), PaddockError> {
        for record in records {
            let entity_id = record
                .get(self.lookup)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PaddockError::Listener(format!(
                        "record missing '{}' identifier on stream {}",
                        self.lookup, self.stream_id
                    ))
                })?;

            self.caches
                .entry(entity_id.to_string())
                .or_default()
                .apply(record);
            self.updates_processed += 1;

            // Market closure is terminal: evict after the final delta landed.
            if self.kind == SubscriptionKind::Market && record_is_closed(record) {
                self.caches.remove(entity_id);
                debug!(
                    "[stream-{}] market {} closed, cache evicted ({} live)",
                    self.stream_id,
                    entity_id,
                    self.caches.len(),
                );
            }
        }

        self.output
            .send(StreamBatch {
                stream_id: self.stream_id,
                clock,
                records: records.to_vec(),
            })
            .map_err(|_| {
                PaddockError::Listener(format!(
                    "output channel closed on stream {}",
                    self.stream_id
                ))
            })
    }

    /// Identifier field this processor reads (`"id"` or `"mid"`).
    pub fn lookup(&self) -> &'static str {
        self.lookup
    }

    /// Live entity caches, keyed by entity id.
    pub fn caches(&self) -> &AHashMap<String, EntityCache> {
        &self.caches
    }

    /// Total records consumed over the processor's lifetime. Counts records,
    /// not batches, and never resets.
    pub fn updates_processed(&self) -> u64 {
        self.updates_processed
    }
}

/// Whether a record carries the terminal market status.
fn record_is_closed(record: &Value) -> bool {
    record
        .pointer("/marketDefinition/status")
        .and_then(Value::as_str)
        == Some("CLOSED")
}

// ---------------------------------------------------------------------------
// Feed listener
// ---------------------------------------------------------------------------

/// Listener installed on a data stream's transport subscription.
///
/// Thin dispatcher around a [`StreamProcessor`] selected once at
/// construction from the subscription operation tag.
#[derive(Debug)]
pub struct FeedListener {
    processor: StreamProcessor,
}

impl FeedListener {
    /// Build a listener for the given subscription operation.
    ///
    /// Fails with [`PaddockError::UnsupportedSubscription`] for any tag
    /// outside the supported set.
    pub fn new(
        stream_id: StreamId,
        operation: &str,
        output: OutputSender,
    ) -> Result<Self, PaddockError> {
        let kind = SubscriptionKind::parse(operation)?;
        Ok(Self {
            processor: StreamProcessor::new(kind, stream_id, output),
        })
    }

    /// The processor built for this listener's subscription kind.
    pub fn processor(&self) -> &StreamProcessor {
        &self.processor
    }
}

impl BatchListener for FeedListener {
    fn process(&mut self, records: &[Value], clock: u64) -> Result<(), PaddockError> {
        self.processor.process(records, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn market_listener() -> (FeedListener, crate::OutputReceiver) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = FeedListener::new(1000, MARKET_SUBSCRIPTION, tx).unwrap();
        (listener, rx)
    }

    #[test]
    fn dispatcher_selects_processor_kind() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let market = FeedListener::new(1, MARKET_SUBSCRIPTION, tx.clone()).unwrap();
        assert_eq!(market.processor().lookup(), "id");

        let race = FeedListener::new(2, RACE_SUBSCRIPTION, tx.clone()).unwrap();
        assert_eq!(race.processor().lookup(), "mid");

        let err = FeedListener::new(3, "orderSubscription", tx).unwrap_err();
        assert!(matches!(err, PaddockError::UnsupportedSubscription(_)));
    }

    #[test]
    fn market_batch_builds_caches_and_forwards_raw_batch() {
        let (mut listener, rx) = market_listener();
        let records = vec![
            json!({"id": "1.123"}),
            json!({"id": "1.456"}),
            json!({"id": "1.123"}),
        ];
        listener.process(&records, 123).unwrap();

        assert_eq!(listener.processor().caches().len(), 2);
        assert!(listener.processor().caches().contains_key("1.123"));
        assert!(listener.processor().caches().contains_key("1.456"));
        assert_eq!(listener.processor().updates_processed(), 3);

        // Exactly one output per batch, carrying the original raw records.
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.stream_id, 1000);
        assert_eq!(batch.clock, 123);
        assert_eq!(batch.records, records);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_market_is_evicted_after_applying() {
        let (mut listener, rx) = market_listener();
        listener.process(&[json!({"id": "1.123", "tv": 10.0})], 1).unwrap();
        assert_eq!(listener.processor().caches().len(), 1);

        let before = listener.processor().updates_processed();
        listener
            .process(
                &[json!({"id": "1.123", "marketDefinition": {"status": "CLOSED"}})],
                2,
            )
            .unwrap();

        assert!(!listener.processor().caches().contains_key("1.123"));
        assert_eq!(listener.processor().updates_processed(), before + 1);
        // Both batches still forwarded.
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn race_batch_uses_mid_lookup() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut listener = FeedListener::new(7, RACE_SUBSCRIPTION, tx).unwrap();
        let records = vec![
            json!({"mid": "1.123"}),
            json!({"mid": "1.456"}),
            json!({"mid": "1.123"}),
        ];
        listener.process(&records, 55).unwrap();

        assert_eq!(listener.processor().lookup(), "mid");
        assert_eq!(listener.processor().caches().len(), 2);
        assert_eq!(listener.processor().updates_processed(), 3);
    }

    #[test]
    fn race_processor_never_evicts_on_market_definition() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut listener = FeedListener::new(8, RACE_SUBSCRIPTION, tx).unwrap();
        listener
            .process(
                &[json!({"mid": "1.123", "marketDefinition": {"status": "CLOSED"}})],
                1,
            )
            .unwrap();
        assert_eq!(listener.processor().caches().len(), 1);
    }

    #[test]
    fn missing_identifier_is_fatal() {
        let (mut listener, _rx) = market_listener();
        let err = listener
            .process(&[json!({"mid": "1.123"})], 1)
            .unwrap_err();
        assert!(matches!(err, PaddockError::Listener(_)));
    }
}
