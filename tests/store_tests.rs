#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! End-to-end store tests over scripted transports.
//!
//! Covers the full connect → fold → finalize → merge path for each domain,
//! plus the connection lifecycle rules: teardown-before-redial, idempotent
//! disconnect, reconnect-after-fixed-delay, and malformed-frame safety.

mod common;

use std::sync::Arc;
use std::time::Duration;

use arena_live_client::config::ArenaLiveConfig;
use arena_live_client::merge::merge;
use arena_live_client::protocol::{BattleTurn, JobStatus, ProcessingPhase};
use arena_live_client::store::{BattleStore, FineTuneStore, PlaygroundStore};
use arena_live_client::transport::Dialer;

use common::*;

fn test_config() -> ArenaLiveConfig {
    ArenaLiveConfig::new("ws://test", "http://test")
}

// ── Battle: full turn lifecycle ─────────────────────────────────────

#[tokio::test]
async fn battle_turn_assembles_and_finalizes() {
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 1)),
        frame(attack_generated_json("s1", "X")),
        frame(target_responded_json("s1", "Y", false)),
        frame(turn_complete_json("s1", 1, "refused")),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), Arc::clone(&dialer) as Arc<dyn Dialer>);

    store.connect("s1").await;
    settle().await;

    assert!(store.is_connected());
    assert_eq!(store.target_id(), Some("s1"));
    assert!(store.pending().is_none());

    let turns = store.completed();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].turn_number, 1);
    assert_eq!(turns[0].attack_prompt.as_deref(), Some("X"));
    assert_eq!(turns[0].target_response.as_deref(), Some("Y"));
    assert_eq!(turns[0].verdict.as_deref(), Some("refused"));

    store.disconnect().await;
}

#[tokio::test]
async fn battle_pending_turn_is_visible_mid_flight() {
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 2)),
        frame(attack_generated_json("s1", "probe")),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    // Progressive display: prompt visible before the target responds.
    let pending = store.pending().unwrap();
    assert_eq!(pending.turn_number, 2);
    assert_eq!(pending.attack_prompt.as_deref(), Some("probe"));
    assert!(pending.target_response.is_none());
    assert!(store.completed().is_empty());

    store.disconnect().await;
}

#[tokio::test]
async fn session_complete_aborts_pending_turn() {
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 1)),
        frame(attack_generated_json("s1", "X")),
        frame(session_complete_json("s1")),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    assert!(store.pending().is_none());
    assert!(store.completed().is_empty());

    store.disconnect().await;
}

#[tokio::test]
async fn battle_error_event_surfaces_on_store() {
    let dialer = MockDialer::new(vec![vec![frame(battle_error_json("s1", "attacker crashed"))]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    assert_eq!(store.error().as_deref(), Some("attacker crashed"));
    // The connection itself stays open.
    assert!(store.is_connected());

    store.disconnect().await;
}

// ── Malformed frames ────────────────────────────────────────────────

#[tokio::test]
async fn malformed_frame_leaves_store_untouched() {
    let dialer = MockDialer::new(vec![vec![frame("not-json".to_string())]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    assert!(store.pending().is_none());
    assert!(store.completed().is_empty());
    assert!(store.last_event().is_none());
    assert!(store.error().is_none());
    assert!(store.is_connected());

    store.disconnect().await;
}

#[tokio::test]
async fn last_event_updates_even_for_ignored_events() {
    // An attack with no pending turn changes nothing, but is still recorded.
    let dialer = MockDialer::new(vec![vec![frame(attack_generated_json("s1", "orphan"))]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    assert!(store.pending().is_none());
    assert!(store.last_event().is_some());

    store.disconnect().await;
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn disconnect_is_idempotent_in_every_state() {
    let dialer = MockDialer::new(vec![vec![]]);
    let mut store = BattleStore::with_dialer(test_config(), Arc::clone(&dialer) as Arc<dyn Dialer>);

    // Before any connection.
    store.disconnect().await;
    assert!(!store.is_connected());
    assert!(store.target_id().is_none());

    store.connect("s1").await;
    settle().await;
    assert!(store.is_connected());

    store.disconnect().await;
    store.disconnect().await;
    assert!(!store.is_connected());
    assert!(store.target_id().is_none());
}

#[tokio::test]
async fn reconnecting_to_new_target_tears_down_old_transport_first() {
    let dialer = MockDialer::new(vec![vec![], vec![]]);
    let mut store =
        FineTuneStore::with_dialer(test_config(), Arc::clone(&dialer) as Arc<dyn Dialer>);

    store.connect("job-1").await;
    settle().await;
    store.connect("job-2").await;
    settle().await;

    assert_eq!(store.target_id(), Some("job-2"));

    let events = dialer.events();
    let drop_1 = events
        .iter()
        .position(|e| e == "drop:transport#1")
        .expect("first transport dropped");
    let dial_2 = events
        .iter()
        .position(|e| e.starts_with("dial#2:"))
        .expect("second dial recorded");
    assert!(
        drop_1 < dial_2,
        "job-1 teardown must complete before job-2 dials: {events:?}"
    );
    assert!(events[dial_2].ends_with("/api/v1/ws/finetuning/job-2"));

    store.disconnect().await;
}

#[tokio::test]
async fn reset_clears_state_without_closing_connection() {
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 1)),
        frame(attack_generated_json("s1", "X")),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;
    assert!(store.pending().is_some());

    store.reset();

    assert!(store.pending().is_none());
    assert!(store.last_event().is_none());
    assert!(store.is_connected(), "reset must not close the transport");
    assert_eq!(store.target_id(), Some("s1"));

    store.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn lost_connection_reconnects_after_fixed_delay() {
    // First transport closes immediately; the replacement stays open.
    let dialer = MockDialer::new(vec![vec![None], vec![]]);
    let mut store = BattleStore::with_dialer(test_config(), Arc::clone(&dialer) as Arc<dyn Dialer>);

    store.connect("s1").await;
    settle().await;
    assert_eq!(dialer.dial_count(), 1);
    assert!(!store.is_connected());

    tokio::time::advance(Duration::from_millis(1999)).await;
    settle().await;
    assert_eq!(dialer.dial_count(), 1, "no reconnect before the fixed delay");

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(dialer.dial_count(), 2);
    assert!(store.is_connected());

    store.disconnect().await;

    tokio::time::advance(Duration::from_millis(10_000)).await;
    settle().await;
    assert_eq!(dialer.dial_count(), 2, "disconnect suppresses reconnects");
}

#[tokio::test(start_paused = true)]
async fn live_list_survives_a_reconnect() {
    let dialer = MockDialer::new(vec![
        vec![
            frame(turn_start_json("s1", 1)),
            frame(turn_complete_json("s1", 1, "refused")),
            None,
        ],
        vec![
            frame(turn_start_json("s1", 2)),
            frame(turn_complete_json("s1", 2, "succeeded")),
        ],
    ]);
    let mut store = BattleStore::with_dialer(test_config(), Arc::clone(&dialer) as Arc<dyn Dialer>);

    store.connect("s1").await;
    settle().await;
    assert_eq!(store.completed().len(), 1);

    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;

    let turns = store.completed();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].turn_number, 1);
    assert_eq!(turns[1].turn_number, 2);

    store.disconnect().await;
}

// ── Playground ──────────────────────────────────────────────────────

#[tokio::test]
async fn playground_exchange_progresses_and_completes() {
    let dialer = MockDialer::new(vec![vec![
        frame(processing_json("c1", ProcessingPhase::Started)),
        frame(processing_json("c1", ProcessingPhase::TargetCalling)),
        frame(processing_json("c1", ProcessingPhase::TargetResponded)),
        frame(processing_json("c1", ProcessingPhase::Analyzing)),
        frame(message_complete_json("c1", 1)),
    ]]);
    let mut store = PlaygroundStore::with_dialer(test_config(), dialer);

    store.connect("c1").await;
    settle().await;

    assert!(store.pending().is_none());
    let messages = store.completed();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_number, 1);
    assert_eq!(messages[0].response.as_deref(), Some("hello"));

    store.disconnect().await;
}

#[tokio::test]
async fn playground_phase_is_visible_mid_flight() {
    let dialer = MockDialer::new(vec![vec![
        frame(processing_json("c1", ProcessingPhase::Started)),
        frame(processing_json("c1", ProcessingPhase::TargetCalling)),
    ]]);
    let mut store = PlaygroundStore::with_dialer(test_config(), dialer);

    store.connect("c1").await;
    settle().await;

    let pending = store.pending().unwrap();
    assert_eq!(pending.phase, ProcessingPhase::TargetCalling);

    store.disconnect().await;
}

// ── Fine-tuning ─────────────────────────────────────────────────────

#[tokio::test]
async fn job_completion_forces_progress_and_step() {
    let dialer = MockDialer::new(vec![vec![
        frame(ft_started_json("job-1")),
        frame(ft_progress_json("job-1", 45.0, "Training epoch 2")),
        frame(ft_log_json("job-1", "epoch 2/3")),
        frame(ft_completed_json("job-1", "m:latest", 120)),
    ]]);
    let mut store = FineTuneStore::with_dialer(test_config(), dialer);

    store.connect("job-1").await;
    settle().await;

    let job = store.job().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_pct, 100.0);
    assert_eq!(job.current_step, "Complete");
    assert_eq!(job.output_model.as_deref(), Some("m:latest"));
    assert_eq!(job.duration_s, Some(120));
    assert_eq!(job.logs, vec!["epoch 2/3"]);

    store.disconnect().await;
}

#[tokio::test]
async fn running_job_reports_live_progress() {
    let dialer = MockDialer::new(vec![vec![
        frame(ft_started_json("job-1")),
        frame(ft_progress_json("job-1", 45.0, "Training epoch 2")),
    ]]);
    let mut store = FineTuneStore::with_dialer(test_config(), dialer);

    store.connect("job-1").await;
    settle().await;

    let job = store.job().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress_pct, 45.0);
    assert_eq!(job.current_step, "Training epoch 2");

    store.disconnect().await;
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn polled_and_live_turns_merge_without_duplicates() {
    // Live connection finalizes turns 2 and 3 while the poll only knows 1 and 2.
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 2)),
        frame(turn_complete_json("s1", 2, "live")),
        frame(turn_start_json("s1", 3)),
        frame(turn_complete_json("s1", 3, "live")),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    let polled = vec![
        polled_turn(1, "polled"),
        polled_turn(2, "polled"),
    ];
    let merged = merge(&polled, &store.completed());

    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0].turn_number, 1);
    assert_eq!(merged[1].turn_number, 2);
    assert_eq!(merged[1].verdict.as_deref(), Some("polled"));
    assert_eq!(merged[2].turn_number, 3);
    assert_eq!(merged[2].verdict.as_deref(), Some("live"));

    store.disconnect().await;
}

#[tokio::test]
async fn clear_completed_empties_live_list_only() {
    let dialer = MockDialer::new(vec![vec![
        frame(turn_start_json("s1", 1)),
        frame(turn_complete_json("s1", 1, "refused")),
        frame(turn_start_json("s1", 2)),
    ]]);
    let mut store = BattleStore::with_dialer(test_config(), dialer);

    store.connect("s1").await;
    settle().await;

    store.clear_completed();
    assert!(store.completed().is_empty());
    // The in-flight turn is untouched.
    assert_eq!(store.pending().unwrap().turn_number, 2);

    store.disconnect().await;
}

fn polled_turn(turn_number: u64, verdict: &str) -> BattleTurn {
    BattleTurn {
        id: Some(uuid::Uuid::from_u128(turn_number as u128)),
        turn_number,
        attack_prompt: Some(format!("prompt {turn_number}")),
        attack_reasoning: None,
        target_response: Some(format!("response {turn_number}")),
        blocked: false,
        verdict: Some(verdict.into()),
    }
}
