//! Live stores — the reactive state container for one domain.
//!
//! A [`LiveStore`] wraps exactly one [`LiveLink`] and folds its event stream
//! into a [`FoldState`]: the pending entity under construction, the entities
//! finalized during this connection's lifetime, the last event seen, and the
//! latest domain-level error. View code connects, reads the accessors on
//! every render, polls the REST listing independently, and merges the two
//! with [`merge`](crate::merge::merge).
//!
//! Each store instance owns its link exclusively; stores for different
//! domains are fully independent and share no state. Model a store as an
//! explicit instance with an explicit lifecycle — construct it where the
//! consuming scope starts, `disconnect` when the last consumer detaches —
//! rather than a module-level global, so teardown stays deterministic.

use std::sync::{Arc, Mutex as StdMutex};

use crate::config::ArenaLiveConfig;
use crate::domains::{Battle, Domain, FineTune, FoldState, Playground};
use crate::link::{lock, LiveLink, Subscription};
use crate::protocol::JobSnapshot;
use crate::transport::Dialer;

/// Reactive live-state container for one domain.
///
/// Generic over [`Domain`]; use the [`BattleStore`], [`PlaygroundStore`],
/// and [`FineTuneStore`] aliases.
pub struct LiveStore<D: Domain> {
    config: ArenaLiveConfig,
    dialer: Arc<dyn Dialer>,
    link: Option<LiveLink<D::Event>>,
    target_id: Option<String>,
    state: Arc<StdMutex<FoldState<D>>>,
    /// Keeps the store's own fold handler registered for the link's lifetime.
    subscription: Option<Subscription>,
}

/// Live store for battle sessions.
pub type BattleStore = LiveStore<Battle>;
/// Live store for playground conversations.
pub type PlaygroundStore = LiveStore<Playground>;
/// Live store for fine-tuning jobs.
pub type FineTuneStore = LiveStore<FineTune>;

impl<D: Domain> LiveStore<D> {
    /// Create a disconnected store that dials over WebSocket.
    #[cfg(feature = "transport-websocket")]
    pub fn new(config: ArenaLiveConfig) -> Self {
        Self::with_dialer(config, Arc::new(crate::transports::WebSocketDialer))
    }

    /// Create a disconnected store with a custom [`Dialer`].
    pub fn with_dialer(config: ArenaLiveConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            config,
            dialer,
            link: None,
            target_id: None,
            state: Arc::new(StdMutex::new(FoldState::default())),
            subscription: None,
        }
    }

    /// Connect to a target, tearing down any prior connection first.
    ///
    /// The previous link — same target or different — is fully shut down
    /// (handlers detached, transport closed, pending reconnect cancelled)
    /// before the new one dials. `is_connected` flips true only once the new
    /// transport is open, not when this call returns.
    pub async fn connect(&mut self, target_id: impl Into<String>) {
        let target_id = target_id.into();
        self.disconnect().await;

        let url = D::route(&self.config.socket_base_url, &target_id);
        let mut link = LiveLink::new(
            url,
            Arc::clone(&self.dialer),
            self.config.reconnect_delay,
            self.config.shutdown_timeout,
        );
        let state = Arc::clone(&self.state);
        let subscription = link.subscribe(move |event| {
            lock(&state).apply(event);
        });
        link.connect().await;

        self.link = Some(link);
        self.subscription = Some(subscription);
        self.target_id = Some(target_id);
    }

    /// Disconnect and clear the internal link reference.
    ///
    /// Always ends with `is_connected() == false` and no link held, whether
    /// or not a connection was actually open. Idempotent.
    pub async fn disconnect(&mut self) {
        self.subscription = None;
        if let Some(mut link) = self.link.take() {
            link.disconnect().await;
        }
        self.target_id = None;
    }

    /// Clear all derived state: pending entity, completed entities, last
    /// event, and error.
    ///
    /// Does not touch the connection — a connected store keeps receiving.
    pub fn reset(&self) {
        lock(&self.state).reset();
    }

    /// Drop the completed-entity list, keeping everything else.
    ///
    /// Used by views after the polled listing has caught up with what this
    /// connection finalized.
    pub fn clear_completed(&self) {
        lock(&self.state).completed.clear();
    }

    /// Returns `true` while the link's transport is open.
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(LiveLink::is_connected)
    }

    /// The target id of the current connection, if any.
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// The entity currently mid-construction.
    pub fn pending(&self) -> Option<D::Pending> {
        lock(&self.state).pending.clone()
    }

    /// Entities finalized during this connection's lifetime, oldest first.
    pub fn completed(&self) -> Vec<D::Record> {
        lock(&self.state).completed.clone()
    }

    /// The most recent event dispatched to this store, whatever its effect.
    pub fn last_event(&self) -> Option<D::Event> {
        lock(&self.state).last_event.clone()
    }

    /// Message of the most recent domain-level failure event.
    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }
}

impl LiveStore<FineTune> {
    /// The job as currently known: the running snapshot while the job is in
    /// flight, otherwise the last finalized snapshot.
    pub fn job(&self) -> Option<JobSnapshot> {
        let state = lock(&self.state);
        state
            .pending
            .clone()
            .or_else(|| state.completed.last().cloned())
    }
}

impl<D: Domain> std::fmt::Debug for LiveStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStore")
            .field("target_id", &self.target_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
