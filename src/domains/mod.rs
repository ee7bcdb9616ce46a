//! Domain definitions — the event-fold engine and its three instantiations.
//!
//! One live process family ("domain") is described by a [`Domain`]
//! implementation: the event type its connection carries, the shape of the
//! entity being assembled, the shape of a finished record, the route rule
//! for deriving the connection URL, and the transition table folding events
//! into state. [`LiveStore`](crate::store::LiveStore) is generic over this
//! trait, so the battle, playground, and fine-tuning stores differ only in
//! data, not in code.
//!
//! A common rule across all three transition tables: an event that refers to
//! a pending entity when none exists (for example a progress update before
//! any start) is a no-op. It never fabricates a partial entity and never
//! errors — a misbehaving backend degrades to stale state, not a crash.

use serde::de::DeserializeOwned;

pub mod battle;
pub mod finetune;
pub mod playground;

pub use battle::Battle;
pub use finetune::FineTune;
pub use playground::Playground;

/// A family of live processes sharing one connection route, one event
/// vocabulary, and one accumulator shape.
pub trait Domain: Send + Sync + 'static {
    /// Inbound event type carried by this domain's connection.
    type Event: DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static;
    /// The entity while it is mid-construction.
    type Pending: Clone + std::fmt::Debug + Send + 'static;
    /// A fully-formed entity produced by a terminal event.
    type Record: Clone + std::fmt::Debug + Send + 'static;

    /// Derive the live endpoint URL for a target id.
    fn route(socket_base_url: &str, target_id: &str) -> String;

    /// Fold one event into the accumulator state.
    ///
    /// Implementations mutate `state` in place and uphold the shared
    /// transition rules: fields are written incrementally and never
    /// reverted, exactly one terminal event finalizes (or aborts) the
    /// pending entity, and events with no pending entity are no-ops.
    fn fold(state: &mut FoldState<Self>, event: &Self::Event);
}

/// Accumulator state for one domain: the pending entity, the entities
/// finalized during this connection's lifetime, the last event seen, and a
/// user-visible error message.
#[derive(Debug)]
pub struct FoldState<D: Domain + ?Sized> {
    /// The entity currently mid-construction, if any.
    pub pending: Option<D::Pending>,
    /// Entities finalized live, in finalization order. Append-only until
    /// explicitly cleared.
    pub completed: Vec<D::Record>,
    /// The most recent event dispatched to this state, whatever its effect.
    pub last_event: Option<D::Event>,
    /// Message of the most recent domain-level failure event.
    pub error: Option<String>,
}

impl<D: Domain> Default for FoldState<D> {
    fn default() -> Self {
        Self {
            pending: None,
            completed: Vec::new(),
            last_event: None,
            error: None,
        }
    }
}

impl<D: Domain> FoldState<D> {
    /// Record `event` as the last event seen, then fold it.
    ///
    /// The last-event field updates for every dispatched event, including
    /// ones the transition table ignores.
    pub fn apply(&mut self, event: &D::Event) {
        self.last_event = Some(event.clone());
        D::fold(self, event);
    }

    /// Clear everything back to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
