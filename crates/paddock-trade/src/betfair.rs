//! Betfair session client.
//!
//! Manages one authenticated Betfair account over REST: interactive login to
//! obtain a session token, periodic keep-alive so the token outlives its
//! idle timeout without interrupting open feed subscriptions, logout, and
//! account-funds refresh.
//!
//! # REST endpoints (relative to the identity / account base URLs)
//!
//! | Operation     | Method | Path                                |
//! |---------------|--------|-------------------------------------|
//! | Login         | POST   | `{identity}/api/login`              |
//! | Keep alive    | POST   | `{identity}/api/keepAlive`          |
//! | Logout        | POST   | `{identity}/api/logout`             |
//! | Account funds | POST   | `{account}/account/getAccountFunds/`|

use async_trait::async_trait;
use paddock_core::{ExchangeKind, PaddockError};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::ExchangeClient;

const DEFAULT_IDENTITY_URL: &str = "https://identitysso.betfair.com";
const DEFAULT_ACCOUNT_URL: &str = "https://api.betfair.com/exchange/account/rest/v1.0";

/// Configuration for one Betfair account.
#[derive(Debug, Clone)]
pub struct BetfairConfig {
    pub username: String,
    pub password: String,
    pub app_key: String,
    /// Identity (login/keep-alive) endpoint override.
    pub identity_url: Option<String>,
    /// Account API endpoint override.
    pub account_url: Option<String>,
    /// Keep a live session but route orders to the simulator.
    pub paper_trade: bool,
}

/// Cached account funds from the last `update_account_details` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountFunds {
    pub available_to_bet: f64,
    pub exposure: f64,
}

/// One authenticated Betfair account session.
pub struct BetfairClient {
    config: BetfairConfig,
    http: reqwest::Client,
    /// Current session token; `None` until login succeeds.
    session_token: RwLock<Option<String>>,
    /// Funds snapshot from the last account refresh.
    funds: RwLock<Option<AccountFunds>>,
}

impl BetfairClient {
    pub fn new(config: BetfairConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session_token: RwLock::new(None),
            funds: RwLock::new(None),
        }
    }

    fn identity_url(&self) -> &str {
        self.config
            .identity_url
            .as_deref()
            .unwrap_or(DEFAULT_IDENTITY_URL)
    }

    fn account_url(&self) -> &str {
        self.config
            .account_url
            .as_deref()
            .unwrap_or(DEFAULT_ACCOUNT_URL)
    }

    /// The current session token, if logged in.
    pub async fn session_token(&self) -> Option<String> {
        self.session_token.read().await.clone()
    }

    /// Funds snapshot from the last account refresh, if any.
    pub async fn account_funds(&self) -> Option<AccountFunds> {
        *self.funds.read().await
    }

    /// POST to an identity endpoint and parse the JSON body.
    async fn identity_request(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<Value, PaddockError> {
        let url = format!("{}{path}", self.identity_url());
        let mut request = self
            .http
            .post(&url)
            .header("X-Application", &self.config.app_key)
            .header("Accept", "application/json");
        if let Some(token) = token {
            request = request.header("X-Authentication", token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| PaddockError::Client(format!("identity request failed: {e}")))?;
        resp.error_for_status()
            .map_err(|e| PaddockError::Client(format!("identity HTTP error: {e}")))?
            .json()
            .await
            .map_err(|e| PaddockError::Client(format!("identity response malformed: {e}")))
    }

    /// The session token, or a client error when not logged in.
    async fn require_token(&self) -> Result<String, PaddockError> {
        self.session_token
            .read()
            .await
            .clone()
            .ok_or_else(|| PaddockError::Client("no active session".into()))
    }
}

#[async_trait]
impl ExchangeClient for BetfairClient {
    fn exchange(&self) -> ExchangeKind {
        ExchangeKind::Betfair
    }

    fn username(&self) -> &str {
        &self.config.username
    }

    fn paper_trade(&self) -> bool {
        self.config.paper_trade
    }

    async fn login(&self) -> Result<(), PaddockError> {
        let url = format!("{}/api/login", self.identity_url());
        let resp = self
            .http
            .post(&url)
            .header("X-Application", &self.config.app_key)
            .header("Accept", "application/json")
            .form(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PaddockError::Client(format!("login request failed: {e}")))?;

        let body: Value = resp
            .error_for_status()
            .map_err(|e| PaddockError::Client(format!("login HTTP error: {e}")))?
            .json()
            .await
            .map_err(|e| PaddockError::Client(format!("login response malformed: {e}")))?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("");
        if status != "SUCCESS" {
            return Err(PaddockError::Client(format!("login rejected: {status}")));
        }

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| PaddockError::Client("login response missing token".into()))?;

        *self.session_token.write().await = Some(token.to_string());
        info!("[betfair] session opened for {}", self.config.username);
        Ok(())
    }

    /// Refresh the session token's idle timeout. The token itself is kept,
    /// so connections authenticated with it stay valid.
    async fn keep_alive(&self) -> Result<(), PaddockError> {
        let token = self.require_token().await?;
        let body = self.identity_request("/api/keepAlive", Some(&token)).await?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("");
        if status != "SUCCESS" {
            return Err(PaddockError::Client(format!("keep alive rejected: {status}")));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), PaddockError> {
        let token = self.require_token().await?;
        self.identity_request("/api/logout", Some(&token)).await?;
        *self.session_token.write().await = None;
        info!("[betfair] session closed for {}", self.config.username);
        Ok(())
    }

    async fn update_account_details(&self) -> Result<(), PaddockError> {
        let token = self.require_token().await?;
        let url = format!("{}/account/getAccountFunds/", self.account_url());
        let resp = self
            .http
            .post(&url)
            .header("X-Application", &self.config.app_key)
            .header("X-Authentication", &token)
            .header("Accept", "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| PaddockError::Client(format!("account request failed: {e}")))?;

        let body: Value = resp
            .error_for_status()
            .map_err(|e| PaddockError::Client(format!("account HTTP error: {e}")))?
            .json()
            .await
            .map_err(|e| PaddockError::Client(format!("account response malformed: {e}")))?;

        let funds = AccountFunds {
            available_to_bet: body
                .get("availableToBetBalance")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            exposure: body.get("exposure").and_then(Value::as_f64).unwrap_or(0.0),
        };
        *self.funds.write().await = Some(funds);
        Ok(())
    }
}
