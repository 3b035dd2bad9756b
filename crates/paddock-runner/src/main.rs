//! # paddock-runner
//!
//! Main entry point for the Paddock trading framework.
//!
//! Loads a JSON configuration file, builds an exchange client per configured
//! account, logs every session in, registers the configured feed
//! subscriptions, and manages the stream and session lifecycle until
//! shutdown. Processed stream output is bridged into the simulated matching
//! engine so paper-trade and all-simulated deployments produce fills.
//!
//! # Usage
//!
//! ```bash
//! paddock-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use paddock_core::config::{AccountConfig, AppConfig, SubscriptionConfig};
use paddock_core::ExchangeKind;
use paddock_feed::manager::StreamManager;
use paddock_feed::sim::SimFeedTransport;
use paddock_feed::{OutputReceiver, Strategy, StreamId, SubscriptionRequest};
use paddock_trade::betfair::{BetfairClient, BetfairConfig};
use paddock_trade::matching::SimulatedRouter;
use paddock_trade::registry::ClientRegistry;
use paddock_trade::simulated::SimulatedClient;
use paddock_trade::ExchangeClient;
use tracing::{error, info, warn};

/// Paddock betting-exchange streaming & trading runner.
#[derive(Parser)]
#[command(name = "paddock-runner", about = "Paddock streaming & trading runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

/// Config-backed strategy: one feed subscription per config entry.
struct ConfigStrategy {
    name: String,
    subscription: SubscriptionRequest,
    streams: Vec<StreamId>,
}

impl ConfigStrategy {
    fn new(idx: usize, config: &SubscriptionConfig) -> Self {
        let mut subscription = SubscriptionRequest {
            market_filter: config.market_filter.clone(),
            market_data_filter: config.market_data_filter.clone(),
            streaming_timeout: config.effective_streaming_timeout(),
            conflate_ms: config.effective_conflate_ms(),
            raw_data: config.wants_raw_data(),
            ..SubscriptionRequest::default()
        };
        if let Some(operation) = &config.operation {
            subscription.operation = operation.clone();
        }
        Self {
            name: config
                .strategy
                .clone()
                .unwrap_or_else(|| format!("subscription-{idx}")),
            subscription,
            streams: Vec::new(),
        }
    }
}

impl Strategy for ConfigStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscription(&self) -> &SubscriptionRequest {
        &self.subscription
    }

    fn streams_mut(&mut self) -> &mut Vec<StreamId> {
        &mut self.streams
    }
}

/// Build the exchange client for one account entry.
fn create_client(account: &AccountConfig) -> Result<Arc<dyn ExchangeClient>> {
    let kind: ExchangeKind = account.exchange.parse()?;
    match kind {
        ExchangeKind::Betfair => {
            let config = BetfairConfig {
                username: account.username.clone(),
                password: account
                    .password
                    .clone()
                    .context("betfair account requires a password")?,
                app_key: account
                    .app_key
                    .clone()
                    .context("betfair account requires an app key")?,
                identity_url: account.identity_url.clone(),
                account_url: account.account_url.clone(),
                paper_trade: account.is_paper_trade(),
            };
            Ok(Arc::new(BetfairClient::new(config)))
        }
        ExchangeKind::Simulated => Ok(Arc::new(SimulatedClient::new(account.username.clone()))),
        ExchangeKind::BetConnect => {
            anyhow::bail!("no client implementation for betconnect yet")
        }
    }
}

/// The only bundled feed transport synthesizes prices locally. Refuse to
/// drive a deployment with it unless at least one account routes to the
/// simulator; a live-only session fed fake data would be worse than no feed.
fn ensure_sim_feed_viable(registry: &ClientRegistry, config: &AppConfig) -> Result<()> {
    if !config.subscriptions.is_empty() && !registry.simulated() {
        anyhow::bail!(
            "feed subscriptions are configured but no account is simulated or \
             paper-trade; the in-process feed synthesizes prices and must not \
             drive live-only deployments"
        );
    }
    Ok(())
}

/// Forward processed stream batches into the simulated books and log fills.
fn spawn_sim_bridge(output: OutputReceiver, router: Arc<SimulatedRouter>) {
    let handle = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || {
        while let Ok(batch) = output.recv() {
            handle.block_on(router.apply_records(&batch.records));
        }
        info!("[bridge] output channel closed");
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = paddock_core::config::load_config(&cli.config)?;

    // 2. Initialize logging — CLI flags win, config fills the gaps
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    paddock_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!(
        "{} starting — config={}, log_level={}",
        config.module_name(),
        cli.config.display(),
        cli.log_level,
    );
    info!(
        "config loaded — {} account(s), {} subscription(s)",
        config.accounts.len(),
        config.subscriptions.len(),
    );

    // 3. Build and authenticate exchange clients
    let mut registry = ClientRegistry::new();
    for (idx, account) in config.accounts.iter().enumerate() {
        let client = create_client(account)
            .with_context(|| format!("account[{idx}] ({})", account.exchange))?;
        registry.add(client)?;
    }
    let registry = Arc::new(registry);

    if !registry.is_empty() {
        let report = registry.login().await;
        if !report.any_ok() {
            anyhow::bail!("login failed for every configured account");
        }
        for (summary, err) in report.failures() {
            warn!("continuing without {summary}: {err}");
        }
    }

    // 4. Periodic session keep-alive
    let keep_alive_secs = config
        .accounts
        .iter()
        .map(|a| a.effective_keep_alive_secs())
        .min()
        .unwrap_or(3600);
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(keep_alive_secs));
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let report = registry.keep_alive().await;
                for (summary, err) in report.failures() {
                    error!("keep alive failed for {summary}: {err}");
                }
            }
        });
    }

    // 5. Register feed subscriptions
    ensure_sim_feed_viable(&registry, &config)?;
    let sim_markets: Vec<String> = config
        .subscriptions
        .iter()
        .filter_map(|s| s.sim_markets.clone())
        .flatten()
        .collect();
    let transport = Arc::new(SimFeedTransport::new(sim_markets));
    let (output_tx, output_rx) = crossbeam_channel::unbounded();
    let mut manager = StreamManager::new(transport, output_tx);

    let mut strategies: Vec<ConfigStrategy> = config
        .subscriptions
        .iter()
        .enumerate()
        .map(|(idx, sub)| ConfigStrategy::new(idx, sub))
        .collect();
    for strategy in &mut strategies {
        manager.register(strategy);
    }

    // 6. Bridge processed output into the simulated matching engine
    let fill_latency_ms = config
        .execution
        .as_ref()
        .and_then(|e| e.fill_latency_ms)
        .unwrap_or(0);
    let (router, fills) = SimulatedRouter::with_fill_latency(fill_latency_ms);
    let router = Arc::new(router);
    spawn_sim_bridge(output_rx, Arc::clone(&router));
    tokio::task::spawn_blocking(move || {
        while let Ok(fill) = fills.recv() {
            info!(
                "[fills] {} {:?} {}@{} on {}",
                fill.bet_id, fill.side, fill.size, fill.price, fill.market_id,
            );
        }
    });

    // 7. Start streams
    manager.start().await?;
    info!(
        "{} stream(s) started — press Ctrl+C to stop",
        manager.len(),
    );

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 9. Tear down streams, then sessions
    manager.stop().await;
    let report = registry.logout().await;
    for (summary, err) in report.failures() {
        error!("logout failed for {summary}: {err}");
    }

    info!("all streams stopped — goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(raw: &str) -> SubscriptionConfig {
        serde_json::from_str(raw).unwrap()
    }

    fn betfair_client(paper_trade: bool) -> Arc<dyn ExchangeClient> {
        Arc::new(BetfairClient::new(BetfairConfig {
            username: "acct".into(),
            password: "pw".into(),
            app_key: "key".into(),
            identity_url: None,
            account_url: None,
            paper_trade,
        }))
    }

    fn app_config(raw: &str) -> AppConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn config_strategy_carries_the_operation_tag() {
        let sub = subscription(r#"{ "raw_data": true, "operation": "raceSubscription" }"#);
        let strategy = ConfigStrategy::new(0, &sub);
        assert_eq!(strategy.subscription.operation, "raceSubscription");
        assert!(strategy.subscription.raw_data);

        let defaulted = ConfigStrategy::new(1, &subscription(r#"{ "raw_data": true }"#));
        assert_eq!(defaulted.subscription.operation, "marketSubscription");
        assert_eq!(defaulted.name, "subscription-1");
    }

    #[test]
    fn sim_feed_refuses_live_only_deployments() {
        let with_subs = app_config(r#"{ "subscriptions": [{}] }"#);
        let no_subs = app_config(r#"{}"#);

        let mut live_only = ClientRegistry::new();
        live_only.add(betfair_client(false)).unwrap();
        assert!(ensure_sim_feed_viable(&live_only, &with_subs).is_err());
        // No subscriptions: nothing to feed, nothing to refuse.
        assert!(ensure_sim_feed_viable(&live_only, &no_subs).is_ok());

        let mut paper = ClientRegistry::new();
        paper.add(betfair_client(true)).unwrap();
        assert!(ensure_sim_feed_viable(&paper, &with_subs).is_ok());

        let mut simulated = ClientRegistry::new();
        simulated.add(Arc::new(SimulatedClient::new("paper1"))).unwrap();
        assert!(ensure_sim_feed_viable(&simulated, &with_subs).is_ok());
    }
}
