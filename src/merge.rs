//! Reconciling the polled listing with live-finalized entities.
//!
//! The polled listing is authoritative — it reflects what the backend has
//! durably written. The live list holds entities this connection finalized
//! that the poll may not have caught up with yet. [`merge`] combines the
//! two into the single sequence a view displays.

use std::collections::HashSet;
use std::hash::Hash;

use crate::protocol::{BattleTurn, JobSnapshot, PlaygroundMessage};

/// An entity with a stable deduplication key.
pub trait Keyed {
    /// Key type — an ordinal for ordered entities, an id otherwise.
    type Key: Eq + Hash;

    /// The deduplication key for this entity.
    fn key(&self) -> Self::Key;
}

impl Keyed for BattleTurn {
    type Key = u64;

    fn key(&self) -> u64 {
        self.turn_number
    }
}

impl Keyed for PlaygroundMessage {
    type Key = u64;

    fn key(&self) -> u64 {
        self.message_number
    }
}

impl Keyed for JobSnapshot {
    type Key = String;

    fn key(&self) -> String {
        self.job_id.clone()
    }
}

/// Merge the polled (persisted) entities with live-finalized ones.
///
/// Returns `polled` followed by the live entities whose key does not appear
/// in `polled`, preserving each list's internal order. On a key collision
/// the polled entity wins, because it reflects durable state.
///
/// Pure and linear in the total entity count — safe to call on every render
/// or poll tick.
pub fn merge<T: Keyed + Clone>(polled: &[T], live: &[T]) -> Vec<T> {
    let seen: HashSet<T::Key> = polled.iter().map(Keyed::key).collect();
    let mut merged = Vec::with_capacity(polled.len() + live.len());
    merged.extend_from_slice(polled);
    merged.extend(
        live.iter()
            .filter(|entity| !seen.contains(&entity.key()))
            .cloned(),
    );
    merged
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::JobStatus;

    fn turn(turn_number: u64, verdict: &str) -> BattleTurn {
        BattleTurn {
            id: None,
            turn_number,
            attack_prompt: None,
            attack_reasoning: None,
            target_response: None,
            blocked: false,
            verdict: Some(verdict.into()),
        }
    }

    #[test]
    fn polled_wins_collisions_and_order_is_preserved() {
        let polled = vec![turn(1, "polled"), turn(2, "polled")];
        let live = vec![turn(2, "live"), turn(3, "live")];

        let merged = merge(&polled, &live);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].turn_number, 1);
        assert_eq!(merged[1].turn_number, 2);
        assert_eq!(merged[1].verdict.as_deref(), Some("polled"));
        assert_eq!(merged[2].turn_number, 3);
        assert_eq!(merged[2].verdict.as_deref(), Some("live"));
    }

    #[test]
    fn no_key_appears_twice() {
        let polled = vec![turn(1, "a"), turn(2, "a"), turn(3, "a")];
        let live = vec![turn(3, "b"), turn(2, "b"), turn(4, "b")];

        let merged = merge(&polled, &live);
        let mut keys: Vec<u64> = merged.iter().map(Keyed::key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), merged.len());
    }

    #[test]
    fn empty_polled_yields_live_as_is() {
        let live = vec![turn(5, "live"), turn(6, "live")];
        let merged = merge(&[], &live);
        assert_eq!(merged, live);
    }

    #[test]
    fn empty_live_yields_polled_as_is() {
        let polled = vec![turn(1, "polled")];
        let merged = merge(&polled, &[]);
        assert_eq!(merged, polled);
    }

    #[test]
    fn same_inputs_give_equal_output() {
        let polled = vec![turn(1, "a"), turn(2, "a")];
        let live = vec![turn(2, "b"), turn(3, "b")];
        assert_eq!(merge(&polled, &live), merge(&polled, &live));
    }

    #[test]
    fn job_snapshots_merge_by_job_id() {
        let persisted = JobSnapshot {
            job_id: "job-1".into(),
            status: JobStatus::Completed,
            progress_pct: 100.0,
            current_step: "Complete".into(),
            logs: vec![],
            error: None,
            output_model: Some("m:latest".into()),
            duration_s: Some(120),
            total_steps: None,
        };
        let live = JobSnapshot {
            job_id: "job-1".into(),
            status: JobStatus::Running,
            progress_pct: 80.0,
            current_step: "Training".into(),
            logs: vec![],
            error: None,
            output_model: None,
            duration_s: None,
            total_steps: None,
        };

        // The durable snapshot wins once the backend has persisted it.
        let merged = merge(&[persisted.clone()], &[live]);
        assert_eq!(merged, vec![persisted]);
    }
}
