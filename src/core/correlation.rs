//! Correlation identifiers for log grouping.
//!
//! Every logical operation (one connection attempt, one tool call) is tagged
//! with a single correlation ID so that interleaved log lines from concurrent
//! operations can be told apart by downstream log processors.

use uuid::Uuid;

/// Generate a globally-unique correlation token.
///
/// Uses a v7 UUID: time-ordered with a random suffix, so tokens sort roughly
/// by creation time and never collide across processes.
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn generated_ids_are_time_ordered() {
        let first = generate_id();
        let second = generate_id();
        assert!(first <= second);
    }
}
