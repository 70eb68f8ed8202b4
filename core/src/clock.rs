use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{excerpt, ParseError};

/// Outcome of comparing two vector timestamps under the component-wise
/// partial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockOrdering {
    Equal,
    Less,
    Greater,
    /// Neither timestamp is component-wise <= the other.
    Concurrent,
}

/// Immutable vector timestamp: a host -> counter mapping plus the host that
/// produced it. Comparison reads missing components as 0; equality is
/// structural over the mapping and ignores the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorTimestamp {
    owner: String,
    clock: BTreeMap<String, u64>,
}

impl VectorTimestamp {
    pub fn new(owner: impl Into<String>, clock: BTreeMap<String, u64>) -> Self {
        Self {
            owner: owner.into(),
            clock,
        }
    }

    /// Parse a JSON-like host -> count object, e.g. `{"A":1,"B":0}`.
    /// `line` is the 1-based source line, carried into the error on failure.
    pub fn parse(clock_text: &str, owner: &str, line: usize) -> Result<Self, ParseError> {
        let clock: BTreeMap<String, u64> =
            serde_json::from_str(clock_text).map_err(|_| ParseError::MalformedClock {
                line,
                text: excerpt(clock_text),
            })?;

        Ok(Self {
            owner: owner.to_string(),
            clock,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The counter recorded for `host`, 0 if absent.
    pub fn get(&self, host: &str) -> u64 {
        self.clock.get(host).copied().unwrap_or(0)
    }

    /// The owner's own counter.
    pub fn own_count(&self) -> u64 {
        self.get(&self.owner)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.clock.keys().map(String::as_str)
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, u64)> {
        self.clock.iter().map(|(host, count)| (host.as_str(), *count))
    }

    /// Component-wise comparison under the standard vector-clock partial
    /// order. Hosts missing from either side count as 0.
    pub fn compare(&self, other: &VectorTimestamp) -> ClockOrdering {
        let mut less = false;
        let mut greater = false;

        for host in self.clock.keys().chain(other.clock.keys()) {
            let ours = self.get(host);
            let theirs = other.get(host);
            if ours < theirs {
                less = true;
            } else if ours > theirs {
                greater = true;
            }
        }

        match (less, greater) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Less,
            (false, true) => ClockOrdering::Greater,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    /// Component-wise maximum of the two clocks. The receiver keeps its own
    /// identity: the result's owner is always `self`'s owner.
    pub fn merge(&self, other: &VectorTimestamp) -> VectorTimestamp {
        let mut clock = self.clock.clone();
        for (host, count) in &other.clock {
            let entry = clock.entry(host.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }

        VectorTimestamp {
            owner: self.owner.clone(),
            clock,
        }
    }
}

// Equality is over the mapping only. Two hosts can hold structurally equal
// clocks without being the same host.
impl PartialEq for VectorTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.clock == other.clock
    }
}

impl Eq for VectorTimestamp {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(owner: &str, entries: &[(&str, u64)]) -> VectorTimestamp {
        let clock = entries
            .iter()
            .map(|(host, count)| (host.to_string(), *count))
            .collect();
        VectorTimestamp::new(owner, clock)
    }

    #[test]
    fn parse_valid_clock() {
        let ts = VectorTimestamp::parse(r#"{"A":2,"B":1}"#, "A", 1).unwrap();
        assert_eq!(ts.owner(), "A");
        assert_eq!(ts.get("A"), 2);
        assert_eq!(ts.get("B"), 1);
        assert_eq!(ts.get("C"), 0);
        assert_eq!(ts.own_count(), 2);
    }

    #[test]
    fn parse_rejects_negative_and_garbage() {
        for bad in [r#"{"A":-1}"#, "not json", r#"{"A":"x"}"#, "[1,2]"] {
            let err = VectorTimestamp::parse(bad, "A", 7).unwrap_err();
            match err {
                ParseError::MalformedClock { line, .. } => assert_eq!(line, 7),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn compare_orders_and_concurrency() {
        let a1 = ts("A", &[("A", 1)]);
        let a2 = ts("A", &[("A", 2), ("B", 1)]);
        let b1 = ts("B", &[("B", 1)]);

        assert_eq!(a1.compare(&a2), ClockOrdering::Less);
        assert_eq!(a2.compare(&a1), ClockOrdering::Greater);
        assert_eq!(a1.compare(&b1), ClockOrdering::Concurrent);
        assert_eq!(a1.compare(&a1), ClockOrdering::Equal);
    }

    #[test]
    fn compare_reads_missing_components_as_zero() {
        let padded = ts("A", &[("A", 1), ("B", 0)]);
        let bare = ts("A", &[("A", 1)]);

        assert_eq!(padded.compare(&bare), ClockOrdering::Equal);
        // Structural equality still distinguishes the explicit zero entry.
        assert_ne!(padded, bare);
    }

    #[test]
    fn merge_is_commutative_in_mapping() {
        let left = ts("A", &[("A", 3), ("B", 1)]);
        let right = ts("B", &[("B", 4), ("C", 2)]);

        let lr = left.merge(&right);
        let rl = right.merge(&left);

        // Same mapping either way; owner follows the receiver.
        assert_eq!(lr, rl);
        assert_eq!(lr.owner(), "A");
        assert_eq!(rl.owner(), "B");
        assert_eq!(lr.get("A"), 3);
        assert_eq!(lr.get("B"), 4);
        assert_eq!(lr.get("C"), 2);
    }

    #[test]
    fn merge_never_mutates_operands() {
        let left = ts("A", &[("A", 1)]);
        let right = ts("B", &[("B", 5)]);
        let _ = left.merge(&right);

        assert_eq!(left.get("B"), 0);
        assert_eq!(right.get("A"), 0);
    }

    #[test]
    fn equality_ignores_owner() {
        let from_a = ts("A", &[("A", 1), ("B", 2)]);
        let from_b = ts("B", &[("A", 1), ("B", 2)]);
        assert_eq!(from_a, from_b);
    }
}
