//! In-memory matching engine behind the simulated execution router.
//!
//! The engine keeps one book per market holding the best available back and
//! lay prices, fed from processed stream output via
//! [`SimulatedRouter::apply_records`]. Matching model:
//!
//! - a Back instruction fills at the available back price when that price is
//!   at or above the requested price; a Lay fills when the available lay
//!   price is at or below the requested price
//! - orders that do not cross rest, and are re-checked in arrival order on
//!   every book update
//! - fills are always for the full stake (no partial fills)
//! - `replace` cancels the resting order and places a fresh one under a new
//!   id at the new price, losing time priority
//! - every admitted order carries an [`OrderStatus`]; cancelling or updating
//!   an order that already matched (or was cancelled/replaced) is rejected
//!   with the order's terminal status, distinct from an unknown id
//!
//! Fills are reported on a `crossbeam_channel` handed out at construction,
//! optionally delayed by a configured fill latency.

use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender, unbounded};
use paddock_core::{
    Fill, OrderInstruction, OrderPackage, OrderStatus, PaddockError, PersistenceType, Side,
    time_util,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::execution::{ExecutionRouter, HttpSession};

// ---------------------------------------------------------------------------
// Book state
// ---------------------------------------------------------------------------

/// Best available prices for one market.
#[derive(Debug, Clone, Copy, Default)]
struct MarketBook {
    /// Best price currently available to back.
    available_back: Option<f64>,
    /// Best price currently available to lay.
    available_lay: Option<f64>,
}

impl MarketBook {
    /// The price an instruction would fill at right now, if it crosses.
    fn crossing_price(&self, side: Side, price: f64) -> Option<f64> {
        match side {
            Side::Back => self.available_back.filter(|&avail| avail >= price),
            Side::Lay => self.available_lay.filter(|&avail| avail <= price),
        }
    }
}

/// An unmatched order waiting for the book to cross it.
#[derive(Debug, Clone)]
struct RestingOrder {
    bet_id: String,
    market_id: String,
    side: Side,
    price: f64,
    size: f64,
    persistence: PersistenceType,
}

/// Books, resting orders, and the lifecycle status of every admitted order.
/// The resting vector stays in arrival order, which is also the re-check
/// order on book updates.
#[derive(Default)]
struct MatchingState {
    books: AHashMap<String, MarketBook>,
    resting: Vec<RestingOrder>,
    statuses: AHashMap<String, OrderStatus>,
}

impl MatchingState {
    fn position_of(&self, bet_id: &str) -> Option<usize> {
        self.resting.iter().position(|o| o.bet_id == bet_id)
    }

    /// Error for an operation on an order that is not resting: reports the
    /// order's terminal status, or that the id was never admitted.
    fn not_executable(&self, bet_id: &str) -> PaddockError {
        match self.statuses.get(bet_id) {
            Some(status) => PaddockError::Execution(format!(
                "order {bet_id} is {status}, not executable"
            )),
            None => PaddockError::Execution(format!("unknown order: {bet_id}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Execution router that matches order packages against the simulated book.
pub struct SimulatedRouter {
    state: Mutex<MatchingState>,
    fills: Sender<Fill>,
    /// Artificial delay before fill reports reach the channel.
    fill_latency: Duration,
}

impl SimulatedRouter {
    /// Build the router plus the receiving end of its fill channel.
    pub fn new() -> (Self, Receiver<Fill>) {
        Self::with_fill_latency(0)
    }

    /// As [`new`](Self::new), delaying every fill report by the given
    /// latency (see `ExecutionConfig::fill_latency_ms`).
    pub fn with_fill_latency(fill_latency_ms: u64) -> (Self, Receiver<Fill>) {
        let (tx, rx) = unbounded();
        (
            Self {
                state: Mutex::new(MatchingState::default()),
                fills: tx,
                fill_latency: Duration::from_millis(fill_latency_ms),
            },
            rx,
        )
    }

    /// Feed processed stream records into the simulated books, then re-check
    /// resting orders in arrival order against the updated prices.
    ///
    /// Records carry the same shape the cache engine consumes: a market id
    /// under `"id"` and best-price ladders under `"batb"` / `"batl"` as
    /// `[level, price, size]` triples (level 0 is best; size 0 clears it).
    pub async fn apply_records(&self, records: &[Value]) {
        let mut state = self.state.lock().await;
        for record in records {
            let Some(market_id) = record.get("id").and_then(Value::as_str) else {
                continue;
            };
            let book = state.books.entry(market_id.to_string()).or_default();
            if let Some(price) = best_level(record, "batb") {
                book.available_back = price;
            }
            if let Some(price) = best_level(record, "batl") {
                book.available_lay = price;
            }
        }
        self.sweep_resting(&mut state);
    }

    /// Match every resting order the current books can cross, oldest first.
    fn sweep_resting(&self, state: &mut MatchingState) {
        let MatchingState {
            books,
            resting,
            statuses,
        } = state;
        let mut remaining = Vec::with_capacity(resting.len());
        for order in resting.drain(..) {
            let crossed = books
                .get(&order.market_id)
                .and_then(|book| book.crossing_price(order.side, order.price));
            match crossed {
                Some(price) => {
                    statuses.insert(order.bet_id.clone(), OrderStatus::Matched);
                    self.emit_fill(&order, price);
                }
                None => remaining.push(order),
            }
        }
        *resting = remaining;
    }

    fn emit_fill(&self, order: &RestingOrder, price: f64) {
        debug!(
            "[sim] matched {} {:?} {}@{} on {}",
            order.bet_id, order.side, order.size, price, order.market_id,
        );
        let fill = Fill {
            bet_id: order.bet_id.clone(),
            market_id: order.market_id.clone(),
            side: order.side,
            price,
            size: order.size,
            matched_at: time_util::now_ms(),
        };
        // Receiver may have been dropped; fills are then discarded.
        if self.fill_latency.is_zero() {
            let _ = self.fills.send(fill);
        } else {
            let fills = self.fills.clone();
            let latency = self.fill_latency;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                let _ = fills.send(fill);
            });
        }
    }

    /// Admit one place instruction: fill immediately if the book crosses it,
    /// otherwise rest it.
    fn admit(
        &self,
        state: &mut MatchingState,
        market_id: &str,
        instruction: &OrderInstruction,
        bet_id: String,
        price: f64,
    ) -> Result<(), PaddockError> {
        // The statuses map holds every id ever admitted, so this also
        // rejects reusing the id of a matched or cancelled order.
        if state.statuses.contains_key(&bet_id) {
            return Err(PaddockError::Execution(format!(
                "duplicate bet id: {bet_id}"
            )));
        }

        let order = RestingOrder {
            bet_id,
            market_id: market_id.to_string(),
            side: instruction.side,
            price,
            size: instruction.size,
            persistence: instruction.persistence,
        };

        let crossed = state
            .books
            .get(market_id)
            .and_then(|book| book.crossing_price(order.side, order.price));
        match crossed {
            Some(fill_price) => {
                state
                    .statuses
                    .insert(order.bet_id.clone(), OrderStatus::Matched);
                self.emit_fill(&order, fill_price);
            }
            None => {
                state
                    .statuses
                    .insert(order.bet_id.clone(), OrderStatus::Executable);
                state.resting.push(order);
            }
        }
        Ok(())
    }

    /// Number of resting orders (diagnostic hook).
    pub async fn resting_count(&self) -> usize {
        self.state.lock().await.resting.len()
    }

    /// Persistence flag of a resting order, if it rests (diagnostic hook).
    pub async fn resting_persistence(&self, bet_id: &str) -> Option<PersistenceType> {
        let state = self.state.lock().await;
        state
            .position_of(bet_id)
            .map(|pos| state.resting[pos].persistence)
    }

    /// Lifecycle status of an admitted order, if the id is known.
    pub async fn order_status(&self, bet_id: &str) -> Option<OrderStatus> {
        self.state.lock().await.statuses.get(bet_id).copied()
    }
}

fn best_level(record: &Value, ladder: &str) -> Option<Option<f64>> {
    let levels = record.get(ladder)?.as_array()?;
    for level in levels {
        let triple = level.as_array()?;
        if triple.first().and_then(Value::as_u64) == Some(0) {
            let price = triple.get(1).and_then(Value::as_f64)?;
            let size = triple.get(2).and_then(Value::as_f64).unwrap_or(0.0);
            return Some((size > 0.0).then_some(price));
        }
    }
    None
}

#[async_trait]
impl ExecutionRouter for SimulatedRouter {
    async fn place(
        &self,
        package: &OrderPackage,
        _session: &HttpSession,
    ) -> Result<(), PaddockError> {
        let mut state = self.state.lock().await;
        for instruction in &package.instructions {
            self.admit(
                &mut state,
                &package.market_id,
                instruction,
                instruction.bet_id.clone(),
                instruction.price,
            )?;
        }
        Ok(())
    }

    async fn cancel(
        &self,
        package: &OrderPackage,
        _session: &HttpSession,
    ) -> Result<(), PaddockError> {
        let mut state = self.state.lock().await;
        for instruction in &package.instructions {
            let pos = state
                .position_of(&instruction.bet_id)
                .ok_or_else(|| state.not_executable(&instruction.bet_id))?;
            state.resting.remove(pos);
            state
                .statuses
                .insert(instruction.bet_id.clone(), OrderStatus::Cancelled);
        }
        Ok(())
    }

    async fn update(
        &self,
        package: &OrderPackage,
        _session: &HttpSession,
    ) -> Result<(), PaddockError> {
        let mut state = self.state.lock().await;
        for instruction in &package.instructions {
            let pos = state
                .position_of(&instruction.bet_id)
                .ok_or_else(|| state.not_executable(&instruction.bet_id))?;
            state.resting[pos].persistence = instruction.persistence;
        }
        Ok(())
    }

    /// Cancel-and-reinstate at the new price: the fresh order gets a new id
    /// and the latest arrival sequence, losing time priority.
    async fn replace(
        &self,
        package: &OrderPackage,
        _session: &HttpSession,
    ) -> Result<(), PaddockError> {
        let mut state = self.state.lock().await;
        for instruction in &package.instructions {
            let new_price = instruction.new_price.ok_or_else(|| {
                PaddockError::Execution(format!(
                    "replace without new price: {}",
                    instruction.bet_id
                ))
            })?;
            let pos = state
                .position_of(&instruction.bet_id)
                .ok_or_else(|| state.not_executable(&instruction.bet_id))?;
            state.resting.remove(pos);
            state
                .statuses
                .insert(instruction.bet_id.clone(), OrderStatus::Replaced);

            let new_id = uuid::Uuid::new_v4().to_string();
            self.admit(&mut state, &package.market_id, instruction, new_id, new_price)?;
        }
        Ok(())
    }
}
