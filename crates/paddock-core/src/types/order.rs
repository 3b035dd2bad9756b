//! Order-related data structures — instructions, packages, and fills.
//!
//! These types flow between the strategy layer and the execution routers.
//! An [`OrderPackage`] is the unit of submission: a batch of instructions
//! sharing a market and an owning account.

use serde::{Deserialize, Serialize};

use super::enums::{ExchangeKind, PackageType, PersistenceType, Side};

// ---------------------------------------------------------------------------
// Instructions (strategy → execution router)
// ---------------------------------------------------------------------------

/// A single order instruction within a package.
///
/// Which fields are meaningful depends on the package's [`PackageType`]:
/// place uses `side`/`price`/`size`, cancel only `bet_id`, update
/// `bet_id`/`persistence`, replace `bet_id`/`new_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInstruction {
    /// Client-assigned order reference (unique per strategy).
    pub bet_id: String,
    /// Runner (selection) the bet targets.
    pub selection_id: u64,
    /// Back or lay.
    pub side: Side,
    /// Requested price (decimal odds).
    pub price: f64,
    /// Stake size.
    pub size: f64,
    /// Behaviour when the market turns in-play.
    #[serde(default)]
    pub persistence: PersistenceType,
    /// Replacement price (replace packages only).
    pub new_price: Option<f64>,
}

/// A batch of order instructions sharing a market and an owning account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPackage {
    /// Market the instructions target (e.g. `"1.234567"`).
    pub market_id: String,
    /// Venue of the account servicing this package.
    pub exchange: ExchangeKind,
    /// Username of the account servicing this package.
    pub username: String,
    /// Strategy identifier for attribution.
    pub strategy: String,
    /// Operation to perform for every instruction in the batch.
    pub package_type: PackageType,
    /// The instructions themselves, processed in order.
    pub instructions: Vec<OrderInstruction>,
}

impl OrderPackage {
    /// Identity of the account servicing this package.
    pub fn account(&self) -> (ExchangeKind, &str) {
        (self.exchange, &self.username)
    }
}

// ---------------------------------------------------------------------------
// Fills (execution router → strategy)
// ---------------------------------------------------------------------------

/// A matched-bet report emitted by an execution router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Order reference the fill belongs to.
    pub bet_id: String,
    /// Market the bet was matched on.
    pub market_id: String,
    /// Back or lay.
    pub side: Side,
    /// Price the bet matched at.
    pub price: f64,
    /// Matched stake.
    pub size: f64,
    /// Match timestamp (ms since epoch, or the feed clock in simulation).
    pub matched_at: u64,
}
