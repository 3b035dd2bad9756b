//! No-network client for the simulated venue.
//!
//! Session operations succeed locally and only track state, so an
//! all-simulated deployment exercises the same registry lifecycle as a live
//! one.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use paddock_core::{ExchangeKind, PaddockError};

use crate::ExchangeClient;

/// Client for the simulated venue.
pub struct SimulatedClient {
    username: String,
    logged_in: AtomicBool,
}

impl SimulatedClient {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            logged_in: AtomicBool::new(false),
        }
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for SimulatedClient {
    fn exchange(&self) -> ExchangeKind {
        ExchangeKind::Simulated
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn login(&self) -> Result<(), PaddockError> {
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn keep_alive(&self) -> Result<(), PaddockError> {
        if self.logged_in() {
            Ok(())
        } else {
            Err(PaddockError::Client("keep alive before login".into()))
        }
    }

    async fn logout(&self) -> Result<(), PaddockError> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn update_account_details(&self) -> Result<(), PaddockError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lifecycle() {
        let client = SimulatedClient::new("paper1");
        assert!(client.is_simulated());
        assert!(client.keep_alive().await.is_err());

        client.login().await.unwrap();
        assert!(client.logged_in());
        client.keep_alive().await.unwrap();

        client.logout().await.unwrap();
        assert!(!client.logged_in());
    }
}
