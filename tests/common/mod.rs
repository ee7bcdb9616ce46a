#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Arena live client integration tests.
//!
//! Provides a scripted [`MockTransport`]/[`MockDialer`] pair plus helpers
//! for building wire-accurate event JSON. The dialer keeps an ordered event
//! log (`dial:`/`close:`/`drop:` entries) so tests can assert teardown
//! ordering, not just counts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;

use arena_live_client::error::Result;
use arena_live_client::protocol::{
    AttackGeneratedData, BattleEvent, CompletedData, ErrorData, FineTuneEvent, LogData,
    MessageCompleteData, PlaygroundEvent, ProcessingData, ProcessingPhase, ProgressData,
    SessionCompleteData, StartedData, TargetRespondedData, TurnCompleteData, TurnStartData,
};
use arena_live_client::transport::{Dialer, Transport};

/// Frames a scripted transport will yield, in order. `None` is a clean
/// server-side close; an exhausted script leaves the transport open.
pub type Script = Vec<Option<Result<String>>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted transport: replays its frames, then hangs until dropped.
pub struct MockTransport {
    frames: VecDeque<Option<Result<String>>>,
    label: String,
    log: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, _message: String) -> Result<()> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        match self.frames.pop_front() {
            Some(item) => item,
            // Script exhausted — stay open until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        push(&self.log, format!("close:{}", self.label));
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        push(&self.log, format!("drop:{}", self.label));
    }
}

// ── MockDialer ──────────────────────────────────────────────────────

/// Hands out scripted transports in order and logs every dial.
pub struct MockDialer {
    scripts: StdMutex<VecDeque<Script>>,
    log: Arc<StdMutex<Vec<String>>>,
    dials: AtomicUsize,
}

impl MockDialer {
    /// One script per expected dial; extra dials get an empty (open) script.
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: StdMutex::new(scripts.into()),
            log: Arc::new(StdMutex::new(Vec::new())),
            dials: AtomicUsize::new(0),
        })
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::Acquire)
    }

    /// The ordered `dial:`/`close:`/`drop:` event log.
    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, url: &str) -> Result<Box<dyn Transport>> {
        let n = self.dials.fetch_add(1, Ordering::AcqRel) + 1;
        push(&self.log, format!("dial#{n}:{url}"));
        let frames = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(MockTransport {
            frames: frames.into(),
            label: format!("transport#{n}"),
            log: Arc::clone(&self.log),
        }))
    }
}

fn push(log: &Arc<StdMutex<Vec<String>>>, entry: String) {
    log.lock().unwrap().push(entry);
}

/// Wrap a wire string as one good frame.
pub fn frame(json: String) -> Option<Result<String>> {
    Some(Ok(json))
}

/// Let spawned link loops run to quiescence on the current-thread runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ── Wire fixtures ───────────────────────────────────────────────────

pub fn turn_start_json(session_id: &str, turn_number: u64) -> String {
    serde_json::to_string(&BattleEvent::TurnStart {
        session_id: session_id.into(),
        data: TurnStartData { turn_number },
    })
    .unwrap()
}

pub fn attack_generated_json(session_id: &str, prompt: &str) -> String {
    serde_json::to_string(&BattleEvent::AttackGenerated {
        session_id: session_id.into(),
        data: AttackGeneratedData {
            prompt: prompt.into(),
            reasoning: None,
        },
    })
    .unwrap()
}

pub fn target_responded_json(session_id: &str, response: &str, blocked: bool) -> String {
    serde_json::to_string(&BattleEvent::TargetResponded {
        session_id: session_id.into(),
        data: TargetRespondedData {
            response: response.into(),
            blocked,
        },
    })
    .unwrap()
}

pub fn turn_complete_json(session_id: &str, turn_number: u64, verdict: &str) -> String {
    serde_json::to_string(&BattleEvent::TurnComplete {
        session_id: session_id.into(),
        data: Box::new(TurnCompleteData {
            turn_number,
            verdict: Some(verdict.into()),
            prompt: None,
            response: None,
            blocked: None,
        }),
    })
    .unwrap()
}

pub fn session_complete_json(session_id: &str) -> String {
    serde_json::to_string(&BattleEvent::SessionComplete {
        session_id: session_id.into(),
        data: SessionCompleteData::default(),
    })
    .unwrap()
}

pub fn battle_error_json(session_id: &str, message: &str) -> String {
    serde_json::to_string(&BattleEvent::Error {
        session_id: session_id.into(),
        data: ErrorData {
            message: message.into(),
        },
    })
    .unwrap()
}

pub fn processing_json(conversation_id: &str, phase: ProcessingPhase) -> String {
    serde_json::to_string(&PlaygroundEvent::Processing {
        conversation_id: conversation_id.into(),
        data: ProcessingData {
            phase,
            message_number: Some(1),
        },
    })
    .unwrap()
}

pub fn message_complete_json(conversation_id: &str, message_number: u64) -> String {
    serde_json::to_string(&PlaygroundEvent::MessageComplete {
        conversation_id: conversation_id.into(),
        data: Box::new(MessageCompleteData {
            message_number,
            prompt: Some("hi".into()),
            response: Some("hello".into()),
            analysis: Some("benign".into()),
        }),
    })
    .unwrap()
}

pub fn ft_started_json(job_id: &str) -> String {
    serde_json::to_string(&FineTuneEvent::Started {
        job_id: job_id.into(),
        data: StartedData { total_steps: None },
    })
    .unwrap()
}

pub fn ft_progress_json(job_id: &str, progress_pct: f32, current_step: &str) -> String {
    serde_json::to_string(&FineTuneEvent::Progress {
        job_id: job_id.into(),
        data: ProgressData {
            progress_pct,
            current_step: current_step.into(),
        },
    })
    .unwrap()
}

pub fn ft_log_json(job_id: &str, line: &str) -> String {
    serde_json::to_string(&FineTuneEvent::Log {
        job_id: job_id.into(),
        data: LogData { line: line.into() },
    })
    .unwrap()
}

pub fn ft_completed_json(job_id: &str, output_model: &str, duration_s: u64) -> String {
    serde_json::to_string(&FineTuneEvent::Completed {
        job_id: job_id.into(),
        data: CompletedData {
            output_model: Some(output_model.into()),
            duration_s: Some(duration_s),
        },
    })
    .unwrap()
}
