//! Wire types for the Arena live event protocol.
//!
//! Every inbound frame is a JSON object with a `type` tag, the id of the
//! entity the event is scoped to, and a `data` payload. Each domain's events
//! deserialize into a closed tagged enum, so everything past the decode
//! boundary operates on exhaustively-checked shapes instead of ad hoc map
//! lookups. Unknown payload fields are ignored; unknown `type` tags fail to
//! decode and the frame is dropped.
//!
//! The record types at the bottom ([`BattleTurn`], [`PlaygroundMessage`],
//! [`JobSnapshot`]) are shared between the live fold path and the REST
//! polling endpoints — the persisted rows decode into the same shapes the
//! accumulators produce.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Decoding ────────────────────────────────────────────────────────

/// Decode one raw text frame into a domain event.
///
/// Returns `None` on any parse failure. A malformed or unrecognized frame is
/// logged and dropped — it never reaches a subscriber and never raises an
/// error (a partial envelope must not propagate).
pub fn decode_event<E: DeserializeOwned>(raw: &str) -> Option<E> {
    match serde_json::from_str::<E>(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("failed to decode live event: {e} — raw: {raw}");
            None
        }
    }
}

// ── Battle events ───────────────────────────────────────────────────

/// Events emitted while a battle session runs its turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEvent {
    /// A new turn began; the attacker is about to generate a prompt.
    TurnStart {
        session_id: String,
        data: TurnStartData,
    },
    /// The attacker produced its prompt (and optionally its reasoning).
    AttackGenerated {
        session_id: String,
        data: AttackGeneratedData,
    },
    /// The target model replied, possibly blocked by a guardrail.
    TargetResponded {
        session_id: String,
        data: TargetRespondedData,
    },
    /// The turn was judged and persisted server-side (boxed to reduce enum size).
    TurnComplete {
        session_id: String,
        data: Box<TurnCompleteData>,
    },
    /// The whole session finished; any half-built turn is abandoned.
    SessionComplete {
        session_id: String,
        #[serde(default)]
        data: SessionCompleteData,
    },
    /// The session hit a server-side failure.
    Error {
        session_id: String,
        data: ErrorData,
    },
}

/// Payload of [`BattleEvent::TurnStart`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStartData {
    pub turn_number: u64,
}

/// Payload of [`BattleEvent::AttackGenerated`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackGeneratedData {
    /// The generated attack prompt.
    pub prompt: String,
    /// The attacker's chain of reasoning, when the backend shares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Payload of [`BattleEvent::TargetResponded`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRespondedData {
    /// The target model's reply.
    pub response: String,
    /// Whether a guardrail intercepted the reply.
    #[serde(default)]
    pub blocked: bool,
}

/// Payload of [`BattleEvent::TurnComplete`].
///
/// Carries whatever the backend has persisted for the finished turn. Fields
/// the event omits are filled from the accumulated pending turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnCompleteData {
    pub turn_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

/// Payload of [`BattleEvent::SessionComplete`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCompleteData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_turns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
}

/// Payload of [`BattleEvent::Error`] and [`FineTuneEvent::Failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

// ── Playground events ───────────────────────────────────────────────

/// Events emitted while a playground exchange is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlaygroundEvent {
    /// The exchange moved to a new processing phase. Phases only move
    /// forward; a stale phase is ignored by the accumulator.
    #[serde(rename = "pg_processing")]
    Processing {
        conversation_id: String,
        data: ProcessingData,
    },
    /// The exchange finished and the message was persisted (boxed to reduce
    /// enum size).
    #[serde(rename = "pg_message_complete")]
    MessageComplete {
        conversation_id: String,
        data: Box<MessageCompleteData>,
    },
}

/// Payload of [`PlaygroundEvent::Processing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingData {
    pub phase: ProcessingPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_number: Option<u64>,
}

/// Processing phases of a playground exchange, in wire order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Started,
    TargetCalling,
    TargetResponded,
    Analyzing,
}

impl ProcessingPhase {
    /// Position of this phase in the forward-only progression.
    pub fn rank(self) -> u8 {
        match self {
            ProcessingPhase::Started => 0,
            ProcessingPhase::TargetCalling => 1,
            ProcessingPhase::TargetResponded => 2,
            ProcessingPhase::Analyzing => 3,
        }
    }
}

/// Payload of [`PlaygroundEvent::MessageComplete`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCompleteData {
    pub message_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

// ── Fine-tuning events ──────────────────────────────────────────────

/// Events emitted while a fine-tuning job runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FineTuneEvent {
    /// The job left the queue and started running.
    #[serde(rename = "ft_started")]
    Started {
        job_id: String,
        #[serde(default)]
        data: StartedData,
    },
    /// Progress percentage and current-step update.
    #[serde(rename = "ft_progress")]
    Progress {
        job_id: String,
        data: ProgressData,
    },
    /// One new log line. Lines are append-only.
    #[serde(rename = "ft_log")]
    Log { job_id: String, data: LogData },
    /// The job finished successfully.
    #[serde(rename = "ft_completed")]
    Completed {
        job_id: String,
        #[serde(default)]
        data: CompletedData,
    },
    /// The job failed with an error message.
    #[serde(rename = "ft_failed")]
    Failed { job_id: String, data: ErrorData },
    /// The job was cancelled before finishing.
    #[serde(rename = "ft_cancelled")]
    Cancelled { job_id: String },
}

/// Payload of [`FineTuneEvent::Started`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
}

/// Payload of [`FineTuneEvent::Progress`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressData {
    /// Completion percentage in `[0, 100]`.
    pub progress_pct: f32,
    /// Human-readable description of what the job is doing right now.
    pub current_step: String,
}

/// Payload of [`FineTuneEvent::Log`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogData {
    pub line: String,
}

/// Payload of [`FineTuneEvent::Completed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletedData {
    /// Reference to the produced model artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_model: Option<String>,
    /// Wall-clock duration of the job in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<u64>,
}

// ── Records ─────────────────────────────────────────────────────────

/// A fully-formed battle turn, either finalized live or fetched from the
/// persisted listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleTurn {
    /// Server-assigned row id. `None` for turns finalized live that the
    /// backend has not confirmed yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub turn_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_response: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
}

/// A fully-formed playground message, live or persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaygroundMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub message_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// Point-in-time view of a fine-tuning job, live or persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress_pct: f32,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
}

/// Lifecycle states of a fine-tuning job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never revert to `Running`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}
