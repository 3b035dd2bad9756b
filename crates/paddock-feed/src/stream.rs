//! Managed feed streams.
//!
//! The stream kinds form a small closed set, so they are modelled as a sum
//! type with exhaustive matching rather than open subclassing:
//!
//! - [`StreamKind::Market`] — raw passthrough: transport market books are
//!   bridged straight to the output channel, no caching.
//! - [`StreamKind::Data`] — low-level cached path: the transport listener is
//!   the cache engine's [`FeedListener`].

use anyhow::Result;
use paddock_core::PaddockError;
use serde_json::Value;
use tracing::{debug, info};

use crate::listener::FeedListener;
use crate::transport::{BatchListener, StreamConnection, StreamTransport, SubscriptionSpec};
use crate::{OutputSender, StreamBatch, StreamId, SubscriptionRequest};

/// The closed set of stream kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Raw market-book passthrough.
    Market,
    /// Cache-engine-backed data stream.
    Data,
}

/// One managed feed subscription.
pub struct Stream {
    kind: StreamKind,
    stream_id: StreamId,
    market_filter: Value,
    market_data_filter: Value,
    streaming_timeout: f64,
    conflate_ms: u64,
    operation: String,
    conn: Option<Box<dyn StreamConnection>>,
}

impl Stream {
    /// Create a stopped stream from a strategy's subscription request.
    pub fn new(kind: StreamKind, stream_id: StreamId, request: &SubscriptionRequest) -> Self {
        Self {
            kind,
            stream_id,
            market_filter: request.market_filter.clone(),
            market_data_filter: request.market_data_filter.clone(),
            streaming_timeout: request.streaming_timeout,
            conflate_ms: request.conflate_ms,
            operation: request.operation.clone(),
            conn: None,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Whether this stream already serves an equivalent subscription.
    ///
    /// The compared field set is a deliberate contract: kind, market filter,
    /// market-data filter, streaming timeout, conflate interval, and the
    /// subscription operation tag. Extending it (e.g. for a new tuning
    /// parameter) is an explicit decision, not a reflection walk.
    pub fn matches(&self, kind: StreamKind, request: &SubscriptionRequest) -> bool {
        self.kind == kind
            && self.market_filter == request.market_filter
            && self.market_data_filter == request.market_data_filter
            && self.streaming_timeout == request.streaming_timeout
            && self.conflate_ms == request.conflate_ms
            && self.operation == request.operation
    }

    /// Open the transport subscription for this stream.
    ///
    /// Market streams install a raw passthrough listener; data streams
    /// install the cache engine's [`FeedListener`]. Fire-and-forget: the
    /// transport's worker owns the receive loop after this returns.
    pub async fn run(&mut self, transport: &dyn StreamTransport, output: &OutputSender) -> Result<()> {
        let spec = SubscriptionSpec {
            stream_id: self.stream_id,
            market_filter: self.market_filter.clone(),
            market_data_filter: self.market_data_filter.clone(),
            streaming_timeout: self.streaming_timeout,
            conflate_ms: self.conflate_ms,
        };

        let listener: Box<dyn BatchListener> = match self.kind {
            StreamKind::Market => Box::new(RawBookListener {
                stream_id: self.stream_id,
                output: output.clone(),
            }),
            StreamKind::Data => Box::new(FeedListener::new(
                self.stream_id,
                &self.operation,
                output.clone(),
            )?),
        };

        let conn = transport
            .open_market_subscription(&spec, listener)
            .await
            .map_err(|e| {
                PaddockError::Transport(format!(
                    "stream {} subscription failed: {e}",
                    self.stream_id
                ))
            })?;
        self.conn = Some(conn);
        info!(
            "[stream-{}] started ({:?}, conflate_ms={})",
            self.stream_id, self.kind, self.conflate_ms,
        );
        Ok(())
    }

    /// Close the underlying connection. No-op when never started; safe to
    /// call repeatedly.
    pub async fn stop(&mut self) -> Result<()> {
        match self.conn.as_mut() {
            Some(conn) => {
                conn.close().await?;
                info!("[stream-{}] stopped", self.stream_id);
            }
            None => debug!("[stream-{}] stop with no active connection", self.stream_id),
        }
        Ok(())
    }

    /// Whether a connection handle is currently held.
    pub fn is_running(&self) -> bool {
        self.conn.is_some()
    }
}

/// Raw passthrough listener used by market streams: every transport batch is
/// forwarded to the output channel untouched.
struct RawBookListener {
    stream_id: StreamId,
    output: OutputSender,
}

impl BatchListener for RawBookListener {
    fn process(&mut self, records: &[Value], clock: u64) -> Result<(), PaddockError> {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn request() -> SubscriptionRequest {
        SubscriptionRequest {
            market_filter: json!({"eventTypeIds": ["7"]}),
            market_data_filter: json!({"fields": ["EX_BEST_OFFERS"]}),
            streaming_timeout: 0.01,
            conflate_ms: 100,
            ..SubscriptionRequest::default()
        }
    }

    #[test]
    fn new_stream_holds_request_attributes_and_no_connection() {
        let stream = Stream::new(StreamKind::Market, 123, &request());
        assert_eq!(stream.stream_id(), 123);
        assert_eq!(stream.kind(), StreamKind::Market);
        assert!(!stream.is_running());
    }

    #[test]
    fn matches_requires_every_field_equal() {
        let stream = Stream::new(StreamKind::Market, 123, &request());
        assert!(stream.matches(StreamKind::Market, &request()));
        assert!(!stream.matches(StreamKind::Data, &request()));

        let mut other = request();
        other.conflate_ms = 200;
        assert!(!stream.matches(StreamKind::Market, &other));

        let mut other = request();
        other.market_filter = json!({"eventTypeIds": ["4339"]});
        assert!(!stream.matches(StreamKind::Market, &other));
    }

    struct FailingTransport;

    #[async_trait]
    impl StreamTransport for FailingTransport {
        async fn open_market_subscription(
            &self,
            _spec: &SubscriptionSpec,
            _listener: Box<dyn BatchListener>,
        ) -> Result<Box<dyn StreamConnection>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn run_surfaces_transport_errors() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut stream = Stream::new(StreamKind::Market, 1000, &request());

        let err = stream.run(&FailingTransport, &tx).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PaddockError>(),
            Some(PaddockError::Transport(_)),
        ));
        assert!(!stream.is_running());
    }

    #[tokio::test]
    async fn stop_without_connection_is_a_no_op() {
        let mut stream = Stream::new(StreamKind::Data, 1000, &request());
        stream.stop().await.unwrap();
        stream.stop().await.unwrap();
        assert!(!stream.is_running());
    }

    #[test]
    fn raw_book_listener_forwards_batches_untouched() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut listener = RawBookListener {
            stream_id: 42,
            output: tx,
        };
        let records = vec![json!({"marketId": "1.123", "status": "OPEN"})];
        listener.process(&records, 9).unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.stream_id, 42);
        assert_eq!(batch.clock, 9);
        assert_eq!(batch.records, records);
    }
}
