//! In-process simulated feed.
//!
//! For all-simulated deployments there is no wire transport to connect to,
//! so this module provides a [`StreamTransport`] that synthesizes market
//! delta batches locally: one worker task per subscription, a random-walk
//! back/lay price per configured market, one batch per conflate interval.
//! The batches flow through the normal listener path, so the cache engine
//! and the simulated execution engine see exactly what a live feed would
//! deliver.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use paddock_core::time_util::now_ms;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{error, info};

use crate::transport::{BatchListener, StreamConnection, StreamTransport, SubscriptionSpec};

/// Narrowest interval the simulated feed will tick at, for subscriptions
/// that request unconflated delivery.
const MIN_TICK_MS: u64 = 50;

/// Price bounds for the random walk (decimal odds).
const MIN_PRICE: f64 = 1.2;
const MAX_PRICE: f64 = 20.0;

/// Transport that synthesizes market updates instead of opening a socket.
pub struct SimFeedTransport {
    markets: Vec<String>,
}

impl SimFeedTransport {
    /// Create a simulated feed over the given market ids.
    pub fn new(markets: Vec<String>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl StreamTransport for SimFeedTransport {
    async fn open_market_subscription(
        &self,
        spec: &SubscriptionSpec,
        listener: Box<dyn BatchListener>,
    ) -> Result<Box<dyn StreamConnection>> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval_ms = spec.conflate_ms.max(MIN_TICK_MS);
        let stream_id = spec.stream_id;
        let markets = self.markets.clone();

        let task = tokio::spawn(async move {
            feed_loop(stream_id, markets, interval_ms, listener, shutdown_rx).await;
        });

        info!(
            "[sim-feed-{stream_id}] subscription opened ({} market(s), tick={interval_ms}ms)",
            self.markets.len(),
        );

        Ok(Box::new(SimFeedConnection {
            shutdown_tx,
            task: Some(task),
        }))
    }
}

/// Connection handle for one simulated subscription.
struct SimFeedConnection {
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

#[async_trait]
impl StreamConnection for SimFeedConnection {
    async fn close(&mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }
}

/// Worker loop: one batch per tick until shutdown or listener failure.
async fn feed_loop(
    stream_id: u64,
    markets: Vec<String>,
    interval_ms: u64,
    mut listener: Box<dyn BatchListener>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut rng = SmallRng::from_entropy();
    let mut backs: Vec<f64> = markets.iter().map(|_| 2.0).collect();
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                info!("[sim-feed-{stream_id}] shutdown requested");
                return;
            }
        }

        let records: Vec<Value> = markets
            .iter()
            .zip(backs.iter_mut())
            .map(|(market_id, back)| {
                *back = (*back + rng.gen_range(-2..=2) as f64 * 0.01)
                    .clamp(MIN_PRICE, MAX_PRICE);
                market_record(market_id, *back, &mut rng)
            })
            .collect();

        if let Err(e) = listener.process(&records, now_ms()) {
            error!("[sim-feed-{stream_id}] listener rejected batch: {e}");
            return;
        }
    }
}

/// One synthetic market delta: best available back/lay ladder levels.
fn market_record(market_id: &str, back: f64, rng: &mut SmallRng) -> Value {
    let lay = back + 0.02;
    let back_size = rng.gen_range(10.0..500.0_f64).round();
    let lay_size = rng.gen_range(10.0..500.0_f64).round();
    json!({
        "id": market_id,
        "marketDefinition": {"status": "OPEN"},
        "batb": [[0, round_price(back), back_size]],
        "batl": [[0, round_price(lay), lay_size]],
    })
}

/// Round to two decimal places so synthesized odds look like ladder prices.
fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{FeedListener, MARKET_SUBSCRIPTION};

    #[tokio::test(flavor = "multi_thread")]
    async fn sim_feed_delivers_batches_through_the_cache_engine() {
        let transport = SimFeedTransport::new(vec!["1.123".into(), "1.456".into()]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = FeedListener::new(1000, MARKET_SUBSCRIPTION, tx).unwrap();
        let spec = SubscriptionSpec {
            stream_id: 1000,
            market_filter: Value::Null,
            market_data_filter: Value::Null,
            streaming_timeout: 1.0,
            conflate_ms: 0, // clamped to the minimum tick
        };

        let mut conn = transport
            .open_market_subscription(&spec, Box::new(listener))
            .await
            .unwrap();

        let batch = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("a batch within two seconds");
        assert_eq!(batch.stream_id, 1000);
        assert_eq!(batch.records.len(), 2);
        let back = batch.records[0]["batb"][0][1].as_f64().unwrap();
        assert!((MIN_PRICE..=MAX_PRICE).contains(&back));

        conn.close().await.unwrap();
        conn.close().await.unwrap(); // idempotent
    }
}
