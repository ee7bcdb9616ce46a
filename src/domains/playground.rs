//! Playground domain — single exchanges progressing through processing phases.

use crate::domains::{Domain, FoldState};
use crate::protocol::{PlaygroundEvent, PlaygroundMessage, ProcessingPhase};

/// A playground exchange while the backend is processing it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    pub message_number: Option<u64>,
    pub phase: ProcessingPhase,
}

/// Marker for the playground domain.
#[derive(Debug, Clone, Copy)]
pub struct Playground;

impl Domain for Playground {
    type Event = PlaygroundEvent;
    type Pending = PendingExchange;
    type Record = PlaygroundMessage;

    fn route(socket_base_url: &str, target_id: &str) -> String {
        format!("{socket_base_url}/api/v1/ws/playground/{target_id}")
    }

    fn fold(state: &mut FoldState<Self>, event: &PlaygroundEvent) {
        match event {
            PlaygroundEvent::Processing { data, .. } => match state.pending.as_mut() {
                None => {
                    // Only the opening phase may create the pending exchange.
                    if data.phase == ProcessingPhase::Started {
                        state.pending = Some(PendingExchange {
                            message_number: data.message_number,
                            phase: ProcessingPhase::Started,
                        });
                    }
                }
                Some(pending) => {
                    // Phases only move forward; stale updates are ignored.
                    if data.phase.rank() > pending.phase.rank() {
                        pending.phase = data.phase;
                    }
                    if pending.message_number.is_none() {
                        pending.message_number = data.message_number;
                    }
                }
            },
            PlaygroundEvent::MessageComplete { data, .. } => {
                if state.pending.take().is_some() {
                    state.completed.push(PlaygroundMessage {
                        id: None,
                        message_number: data.message_number,
                        prompt: data.prompt.clone(),
                        response: data.response.clone(),
                        analysis: data.analysis.clone(),
                    });
                }
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
    use crate::protocol::{MessageCompleteData, ProcessingData};

    fn processing(phase: ProcessingPhase) -> PlaygroundEvent {
        PlaygroundEvent::Processing {
            conversation_id: "c1".into(),
            data: ProcessingData {
                phase,
                message_number: Some(3),
            },
        }
    }

    fn message_complete(message_number: u64) -> PlaygroundEvent {
        PlaygroundEvent::MessageComplete {
            conversation_id: "c1".into(),
            data: Box::new(MessageCompleteData {
                message_number,
                prompt: Some("hi".into()),
                response: Some("hello".into()),
                analysis: Some("benign".into()),
            }),
        }
    }

    #[test]
    fn phases_advance_in_order() {
        let mut state = FoldState::<Playground>::default();
        state.apply(&processing(ProcessingPhase::Started));
        state.apply(&processing(ProcessingPhase::TargetCalling));
        state.apply(&processing(ProcessingPhase::TargetResponded));
        state.apply(&processing(ProcessingPhase::Analyzing));

        let pending = state.pending.as_ref().unwrap();
        assert_eq!(pending.phase, ProcessingPhase::Analyzing);
        assert_eq!(pending.message_number, Some(3));
    }

    #[test]
    fn stale_phase_is_ignored() {
        let mut state = FoldState::<Playground>::default();
        state.apply(&processing(ProcessingPhase::Started));
        state.apply(&processing(ProcessingPhase::Analyzing));
        state.apply(&processing(ProcessingPhase::TargetCalling));

        assert_eq!(
            state.pending.as_ref().unwrap().phase,
            ProcessingPhase::Analyzing
        );
    }

    #[test]
    fn non_start_phase_without_pending_is_no_op() {
        let mut state = FoldState::<Playground>::default();
        state.apply(&processing(ProcessingPhase::TargetResponded));
        assert!(state.pending.is_none());
    }

    #[test]
    fn completion_finalizes_and_clears() {
        let mut state = FoldState::<Playground>::default();
        state.apply(&processing(ProcessingPhase::Started));
        state.apply(&message_complete(3));

        assert!(state.pending.is_none());
        assert_eq!(state.completed.len(), 1);
        let message = &state.completed[0];
        assert_eq!(message.message_number, 3);
        assert_eq!(message.response.as_deref(), Some("hello"));
        assert_eq!(message.analysis.as_deref(), Some("benign"));
    }

    #[test]
    fn completion_without_pending_is_no_op() {
        let mut state = FoldState::<Playground>::default();
        state.apply(&message_complete(3));
        state.apply(&message_complete(3));

        assert!(state.completed.is_empty());
    }
}
