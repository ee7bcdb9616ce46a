//! Battle domain — adversarial test sessions and their turns.

use crate::domains::{Domain, FoldState};
use crate::protocol::{BattleEvent, BattleTurn, TurnCompleteData};

/// A battle turn while it is mid-construction.
///
/// Fields are written incrementally as events arrive and stay visible for
/// progressive display: the attack prompt is readable before the target's
/// reply exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub turn_number: u64,
    pub attack_prompt: Option<String>,
    pub attack_reasoning: Option<String>,
    pub target_response: Option<String>,
    pub blocked: Option<bool>,
}

impl PendingTurn {
    fn new(turn_number: u64) -> Self {
        Self {
            turn_number,
            attack_prompt: None,
            attack_reasoning: None,
            target_response: None,
            blocked: None,
        }
    }

    /// Build the finished record, preferring the terminal event's payload
    /// over the accumulated fields wherever both exist.
    fn finalize(self, data: &TurnCompleteData) -> BattleTurn {
        BattleTurn {
            id: None,
            turn_number: data.turn_number,
            attack_prompt: data.prompt.clone().or(self.attack_prompt),
            attack_reasoning: self.attack_reasoning,
            target_response: data.response.clone().or(self.target_response),
            blocked: data.blocked.or(self.blocked).unwrap_or(false),
            verdict: data.verdict.clone(),
        }
    }
}

/// Marker for the battle domain.
#[derive(Debug, Clone, Copy)]
pub struct Battle;

impl Domain for Battle {
    type Event = BattleEvent;
    type Pending = PendingTurn;
    type Record = BattleTurn;

    fn route(socket_base_url: &str, target_id: &str) -> String {
        format!("{socket_base_url}/api/v1/ws/{target_id}")
    }

    fn fold(state: &mut FoldState<Self>, event: &BattleEvent) {
        match event {
            BattleEvent::TurnStart { data, .. } => {
                // A duplicate start while a turn is pending is backend
                // misuse; the half-built turn is kept.
                if state.pending.is_none() {
                    state.pending = Some(PendingTurn::new(data.turn_number));
                }
            }
            BattleEvent::AttackGenerated { data, .. } => {
                if let Some(pending) = state.pending.as_mut() {
                    pending.attack_prompt = Some(data.prompt.clone());
                    if data.reasoning.is_some() {
                        pending.attack_reasoning = data.reasoning.clone();
                    }
                }
            }
            BattleEvent::TargetResponded { data, .. } => {
                if let Some(pending) = state.pending.as_mut() {
                    pending.target_response = Some(data.response.clone());
                    pending.blocked = Some(data.blocked);
                }
            }
            BattleEvent::TurnComplete { data, .. } => {
                // Finalize at most once; a replayed terminal finds no
                // pending turn and does nothing.
                if let Some(pending) = state.pending.take() {
                    state.completed.push(pending.finalize(data));
                }
            }
            BattleEvent::SessionComplete { .. } => {
                // Abort: drop any half-built turn without finalizing it.
                state.pending = None;
            }
            BattleEvent::Error { data, .. } => {
                state.error = Some(data.message.clone());
            }
        }
    }
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
    use crate::protocol::{
        AttackGeneratedData, ErrorData, SessionCompleteData, TargetRespondedData, TurnStartData,
    };

    fn turn_start(turn_number: u64) -> BattleEvent {
        BattleEvent::TurnStart {
            session_id: "s1".into(),
            data: TurnStartData { turn_number },
        }
    }

    fn attack(prompt: &str) -> BattleEvent {
        BattleEvent::AttackGenerated {
            session_id: "s1".into(),
            data: AttackGeneratedData {
                prompt: prompt.into(),
                reasoning: None,
            },
        }
    }

    fn response(text: &str, blocked: bool) -> BattleEvent {
        BattleEvent::TargetResponded {
            session_id: "s1".into(),
            data: TargetRespondedData {
                response: text.into(),
                blocked,
            },
        }
    }

    fn complete(turn_number: u64, verdict: &str) -> BattleEvent {
        BattleEvent::TurnComplete {
            session_id: "s1".into(),
            data: Box::new(TurnCompleteData {
                turn_number,
                verdict: Some(verdict.into()),
                prompt: None,
                response: None,
                blocked: None,
            }),
        }
    }

    #[test]
    fn full_turn_accumulates_then_finalizes() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(1));
        state.apply(&attack("X"));

        // Progressive display: the prompt is visible before the reply.
        let pending = state.pending.as_ref().unwrap();
        assert_eq!(pending.attack_prompt.as_deref(), Some("X"));
        assert!(pending.target_response.is_none());

        state.apply(&response("Y", false));
        state.apply(&complete(1, "refused"));

        assert!(state.pending.is_none());
        assert_eq!(state.completed.len(), 1);
        let turn = &state.completed[0];
        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.attack_prompt.as_deref(), Some("X"));
        assert_eq!(turn.target_response.as_deref(), Some("Y"));
        assert_eq!(turn.verdict.as_deref(), Some("refused"));
        assert!(!turn.blocked);
    }

    #[test]
    fn replayed_terminal_event_does_not_duplicate() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(1));
        state.apply(&complete(1, "refused"));
        state.apply(&complete(1, "refused"));

        assert_eq!(state.completed.len(), 1);
        assert!(state.pending.is_none());
    }

    #[test]
    fn events_without_pending_turn_are_no_ops() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&attack("orphan"));
        state.apply(&response("orphan", true));
        state.apply(&complete(7, "succeeded"));

        assert!(state.pending.is_none());
        assert!(state.completed.is_empty());
        // last_event still tracks everything dispatched.
        assert!(matches!(
            state.last_event,
            Some(BattleEvent::TurnComplete { .. })
        ));
    }

    #[test]
    fn session_complete_aborts_without_finalizing() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(3));
        state.apply(&attack("X"));
        state.apply(&BattleEvent::SessionComplete {
            session_id: "s1".into(),
            data: SessionCompleteData::default(),
        });

        assert!(state.pending.is_none());
        assert!(state.completed.is_empty());
    }

    #[test]
    fn duplicate_start_keeps_half_built_turn() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(1));
        state.apply(&attack("X"));
        state.apply(&turn_start(2));

        let pending = state.pending.as_ref().unwrap();
        assert_eq!(pending.turn_number, 1);
        assert_eq!(pending.attack_prompt.as_deref(), Some("X"));
    }

    #[test]
    fn fields_persist_until_terminal_event() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(1));
        state.apply(&attack("X"));
        state.apply(&response("Y", true));

        // Later non-terminal events never blank earlier fields.
        let pending = state.pending.as_ref().unwrap();
        assert_eq!(pending.attack_prompt.as_deref(), Some("X"));
        assert_eq!(pending.target_response.as_deref(), Some("Y"));
        assert_eq!(pending.blocked, Some(true));
    }

    #[test]
    fn error_event_surfaces_message() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&BattleEvent::Error {
            session_id: "s1".into(),
            data: ErrorData {
                message: "attacker crashed".into(),
            },
        });
        assert_eq!(state.error.as_deref(), Some("attacker crashed"));
    }

    #[test]
    fn terminal_payload_wins_over_accumulated_fields() {
        let mut state = FoldState::<Battle>::default();
        state.apply(&turn_start(1));
        state.apply(&attack("live prompt"));
        state.apply(&BattleEvent::TurnComplete {
            session_id: "s1".into(),
            data: Box::new(TurnCompleteData {
                turn_number: 1,
                verdict: Some("succeeded".into()),
                prompt: Some("persisted prompt".into()),
                response: Some("persisted response".into()),
                blocked: Some(true),
            }),
        });

        let turn = &state.completed[0];
        assert_eq!(turn.attack_prompt.as_deref(), Some("persisted prompt"));
        assert_eq!(turn.target_response.as_deref(), Some("persisted response"));
        assert!(turn.blocked);
    }
}
