//! Per-entity delta-accumulated state.
//!
//! The cache engine keeps one [`EntityCache`] per tracked market or race.
//! Each incoming record is a delta: its fields are merged into the cache
//! (accumulate/overwrite per field), never a full replacement. The cache is
//! internal bookkeeping — the published artifact downstream is always the raw
//! batch, not this state.

use paddock_core::MarketStatus;
use serde_json::Value;

/// Accumulated state for one tracked entity.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    state: Value,
}

impl EntityCache {
    /// Merge one delta record into the accumulated state.
    pub fn apply(&mut self, record: &Value) {
        merge_value(&mut self.state, record);
    }

    /// The accumulated state so far.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Market lifecycle status from the last applied `marketDefinition`, if
    /// one has been delivered.
    pub fn market_status(&self) -> Option<MarketStatus> {
        match self.state.pointer("/marketDefinition/status")?.as_str()? {
            "OPEN" => Some(MarketStatus::Open),
            "SUSPENDED" => Some(MarketStatus::Suspended),
            "CLOSED" => Some(MarketStatus::Closed),
            _ => None,
        }
    }
}

/// Recursively merge `delta` into `target`.
///
/// Object fields merge key-by-key; everything else (arrays, scalars, null)
/// overwrites. This matches how the feed delivers deltas: nested objects
/// carry only the fields that changed, arrays are always complete images.
pub fn merge_value(target: &mut Value, delta: &Value) {
    match (target, delta) {
        (Value::Object(target_map), Value::Object(delta_map)) => {
            for (key, value) in delta_map {
                merge_value(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, delta) => {
            *target_slot = delta.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_accumulates_fields() {
        let mut cache = EntityCache::default();
        cache.apply(&json!({"id": "1.123", "tv": 100.0}));
        cache.apply(&json!({"tv": 150.0, "con": true}));

        assert_eq!(cache.state()["id"], "1.123");
        assert_eq!(cache.state()["tv"], 150.0);
        assert_eq!(cache.state()["con"], true);
    }

    #[test]
    fn apply_merges_nested_objects() {
        let mut cache = EntityCache::default();
        cache.apply(&json!({"marketDefinition": {"status": "OPEN", "inPlay": false}}));
        cache.apply(&json!({"marketDefinition": {"inPlay": true}}));

        // Untouched sibling fields survive the second delta.
        assert_eq!(cache.state()["marketDefinition"]["status"], "OPEN");
        assert_eq!(cache.state()["marketDefinition"]["inPlay"], true);
    }

    #[test]
    fn apply_overwrites_arrays_whole() {
        let mut cache = EntityCache::default();
        cache.apply(&json!({"batb": [[0, 2.0, 10.0], [1, 1.99, 5.0]]}));
        cache.apply(&json!({"batb": [[0, 2.02, 8.0]]}));

        assert_eq!(cache.state()["batb"], json!([[0, 2.02, 8.0]]));
    }

    #[test]
    fn market_status_parsing() {
        let mut cache = EntityCache::default();
        assert_eq!(cache.market_status(), None);

        cache.apply(&json!({"marketDefinition": {"status": "SUSPENDED"}}));
        assert_eq!(cache.market_status(), Some(MarketStatus::Suspended));

        cache.apply(&json!({"marketDefinition": {"status": "CLOSED"}}));
        assert_eq!(cache.market_status(), Some(MarketStatus::Closed));
    }
}
