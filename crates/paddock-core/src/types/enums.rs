//! Enumerations used throughout the Paddock framework.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PaddockError;

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported betting-exchange venues.
///
/// `Simulated` is a first-class venue kind: a deployment whose clients are all
/// simulated (or paper-trading) routes order execution through the in-memory
/// matching engine instead of a live transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Betfair,
    BetConnect,
    Simulated,
}

impl ExchangeKind {
    /// All venue kinds the client registry accepts.
    pub const SUPPORTED: [ExchangeKind; 3] = [
        ExchangeKind::Betfair,
        ExchangeKind::BetConnect,
        ExchangeKind::Simulated,
    ];
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Betfair => write!(f, "betfair"),
            Self::BetConnect => write!(f, "betconnect"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = PaddockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "betfair" => Ok(Self::Betfair),
            "betconnect" => Ok(Self::BetConnect),
            "simulated" => Ok(Self::Simulated),
            other => Err(PaddockError::UnknownExchange(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Order / trading enums
// ---------------------------------------------------------------------------

/// Bet side on a betting exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Betting *for* an outcome at the offered price.
    Back,
    /// Betting *against* an outcome (acting as the bookmaker).
    Lay,
}

/// Order lifecycle status, as tracked by the simulated matching engine.
///
/// `Executable` is the resting state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Executable,
    Matched,
    Cancelled,
    Replaced,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Executable => write!(f, "executable"),
            Self::Matched => write!(f, "matched"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Replaced => write!(f, "replaced"),
        }
    }
}

/// What should happen to an unmatched order when its market turns in-play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PersistenceType {
    #[default]
    Lapse,
    Persist,
}

/// Market lifecycle status as delivered on the data feed.
///
/// `Closed` is the terminal state: no further updates will arrive and any
/// cached state for the market may be evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Suspended,
    Closed,
}

/// Operation kind carried by an order package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    Place,
    Cancel,
    Update,
    Replace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_kind_round_trip() {
        for kind in ExchangeKind::SUPPORTED {
            assert_eq!(kind.to_string().parse::<ExchangeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn exchange_kind_unknown() {
        let err = "smarkets".parse::<ExchangeKind>().unwrap_err();
        assert!(matches!(err, PaddockError::UnknownExchange(_)));
    }
}
