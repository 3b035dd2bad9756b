//! Stream manager — registry and lifecycle of all feed subscriptions.
//!
//! Strategies declare what they want to subscribe to; the manager either
//! reuses an existing equivalent stream or creates a new one with a freshly
//! allocated id. Ids start at 1000 and only ever increment; the stream
//! collection is append-only and torn down only at process shutdown.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::stream::{Stream, StreamKind};
use crate::transport::StreamTransport;
use crate::{OutputSender, Strategy, StreamId};

/// First stream id handed out by a manager instance.
const FIRST_STREAM_ID: StreamId = 1000;

/// Registry of managed streams plus the session context they connect with.
pub struct StreamManager {
    transport: Arc<dyn StreamTransport>,
    output: OutputSender,
    streams: Vec<Stream>,
    next_stream_id: StreamId,
}

impl StreamManager {
    /// Create an empty manager. Each manager owns its own id counter, so
    /// multiple managers in one process each start again at 1000.
    pub fn new(transport: Arc<dyn StreamTransport>, output: OutputSender) -> Self {
        Self {
            transport,
            output,
            streams: Vec::new(),
            next_stream_id: FIRST_STREAM_ID,
        }
    }

    /// The transport/session context streams authenticate with.
    pub fn transport(&self) -> &Arc<dyn StreamTransport> {
        &self.transport
    }

    /// Register a strategy's subscription, reusing an equivalent stream when
    /// one exists. The selected stream id is recorded onto the strategy's
    /// stream list; returns that id.
    pub fn register(&mut self, strategy: &mut dyn Strategy) -> StreamId {
        let request = strategy.subscription().clone();
        let kind = if request.raw_data {
            StreamKind::Data
        } else {
            StreamKind::Market
        };

        let stream_id = match self
            .streams
            .iter()
            .find(|stream| stream.matches(kind, &request))
        {
            Some(existing) => {
                info!(
                    "[streams] '{}' joins existing stream {}",
                    strategy.name(),
                    existing.stream_id(),
                );
                existing.stream_id()
            }
            None => {
                let stream_id = self.increment_stream_id();
                self.streams.push(Stream::new(kind, stream_id, &request));
                info!(
                    "[streams] '{}' gets new {:?} stream {}",
                    strategy.name(),
                    kind,
                    stream_id,
                );
                stream_id
            }
        };

        strategy.streams_mut().push(stream_id);
        stream_id
    }

    /// Allocate the next stream id and advance the counter.
    fn increment_stream_id(&mut self) -> StreamId {
        let id = self.next_stream_id;
        self.next_stream_id += 1;
        id
    }

    /// Start every managed stream, in registration order. Fails fast on the
    /// first transport error.
    pub async fn start(&mut self) -> Result<()> {
        info!("[streams] starting {} stream(s)", self.streams.len());
        for stream in &mut self.streams {
            stream.run(self.transport.as_ref(), &self.output).await?;
        }
        Ok(())
    }

    /// Stop every managed stream, in registration order. Best-effort: a
    /// close failure on one stream does not skip the rest.
    pub async fn stop(&mut self) {
        for stream in &mut self.streams {
            if let Err(e) = stream.stop().await {
                error!("[stream-{}] stop failed: {e}", stream.stream_id());
            }
        }
        info!("[streams] stopped {} stream(s)", self.streams.len());
    }

    /// Iterate managed streams in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
