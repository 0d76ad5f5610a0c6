//! Aggregation tag map
//!
//! Accumulates the aggregations requested from SELECT, ORDER BY and HAVING
//! of one statement. A tag is stored at most once and the first writer wins;
//! `_count` is never stored because Elasticsearch reports the bucket document
//! count on its own.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

/// Implicit per-bucket document count
pub const COUNT_TAG: &str = "_count";

/// One aggregation resolved from a function call
#[derive(Debug, Clone, PartialEq)]
pub struct AggAllocation {
    pub tag: String,
    /// DSL body, `None` only for [`COUNT_TAG`]
    pub body: Option<Value>,
    /// Single-value numeric metric usable from a bucket script
    pub numeric: bool,
}

#[derive(Debug, Clone)]
struct AggEntry {
    body: Value,
    numeric: bool,
}

/// Ordered, deduplicating tag to aggregation-body map
#[derive(Debug, Default)]
pub struct AggTagMap {
    entries: Vec<(String, AggEntry)>,
    index: HashMap<String, usize>,
}

impl AggTagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an allocation, returning whether a new body was added
    pub fn insert(&mut self, allocation: &AggAllocation) -> bool {
        let Some(body) = &allocation.body else {
            return false;
        };
        if allocation.tag == COUNT_TAG || self.index.contains_key(&allocation.tag) {
            return false;
        }

        trace!("Registering aggregation {}", allocation.tag);
        self.index
            .insert(allocation.tag.clone(), self.entries.len());
        self.entries.push((
            allocation.tag.clone(),
            AggEntry {
                body: body.clone(),
                numeric: allocation.numeric,
            },
        ));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags of single-value numeric metrics, in insertion order
    pub fn numeric_tags(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.numeric)
            .map(|(tag, _)| tag.as_str())
            .collect()
    }

    /// Metric bodies keyed by tag, in insertion order
    pub fn to_object(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(tag, entry)| (tag.clone(), entry.body.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metric(tag: &str, body: Value) -> AggAllocation {
        AggAllocation {
            tag: tag.to_string(),
            body: Some(body),
            numeric: true,
        }
    }

    #[test]
    fn test_first_writer_wins() {
        let mut map = AggTagMap::new();
        assert!(map.insert(&metric("sum_colB", json!({"sum": {"field": "colB"}}))));
        assert!(!map.insert(&metric("sum_colB", json!({"sum": {"field": "other"}}))));
        assert_eq!(map.len(), 1);
        assert_eq!(
            Value::Object(map.to_object()),
            json!({"sum_colB": {"sum": {"field": "colB"}}})
        );
    }

    #[test]
    fn test_count_never_stored() {
        let mut map = AggTagMap::new();
        let count = AggAllocation {
            tag: COUNT_TAG.to_string(),
            body: None,
            numeric: true,
        };
        assert!(!map.insert(&count));
        assert!(map.is_empty());
        assert!(map.to_object().is_empty());
    }

    #[test]
    fn test_insertion_order_and_numeric_filter() {
        let mut map = AggTagMap::new();
        map.insert(&metric("max_colC", json!({"max": {"field": "colC"}})));
        map.insert(&AggAllocation {
            tag: "range_colA".to_string(),
            body: Some(json!({"range": {"field": "colA", "ranges": []}})),
            numeric: false,
        });
        map.insert(&metric("avg_colB", json!({"avg": {"field": "colB"}})));

        let keys: Vec<String> = map.to_object().keys().cloned().collect();
        assert_eq!(keys, vec!["max_colC", "range_colA", "avg_colB"]);
        assert_eq!(map.numeric_tags(), vec!["max_colC", "avg_colB"]);
    }
}
