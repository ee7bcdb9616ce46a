//! Reconnecting live link — one persistent connection per tracked entity.
//!
//! [`LiveLink`] owns a background read loop over a [`Transport`] opened
//! through a [`Dialer`]. Inbound text frames are decoded into the link's
//! event type and dispatched synchronously to every subscriber in
//! registration order; frames that fail to decode are dropped without
//! reaching a subscriber.
//!
//! # Reconnect policy
//!
//! An unexpected close (transport error, server-side close, failed dial)
//! schedules exactly one reconnect attempt after a fixed delay, repeating
//! indefinitely while the link is desired. There is no backoff, no jitter,
//! and no retry cap. [`disconnect`](LiveLink::disconnect) cancels a pending
//! reconnect timer and permanently suppresses further attempts for this
//! link — the timer must never fire after a deliberate shutdown.
//!
//! # Ordering
//!
//! Events for a target id are assumed delivered in the order the remote
//! process emitted them; no sequence numbers are validated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::protocol::decode_event;
use crate::transport::{Dialer, Transport};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// Lock a std mutex, recovering the guard if a panicking handler poisoned it.
pub(crate) fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registered handlers, kept in registration order.
struct HandlerRegistry<E> {
    next_id: u64,
    entries: Vec<(u64, Handler<E>)>,
}

impl<E> HandlerRegistry<E> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

/// Handle to a registered event handler.
///
/// Dropping (or explicitly [`cancel`](Subscription::cancel)ing) the
/// subscription removes exactly its own handler and no others.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Remove the handler now instead of waiting for drop.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A reconnecting connection to one live target.
///
/// Created by a [`LiveStore`](crate::store::LiveStore) with the URL derived
/// from the store's domain route; usable standalone when only the raw event
/// stream is needed.
pub struct LiveLink<E> {
    url: String,
    dialer: Arc<dyn Dialer>,
    handlers: Arc<StdMutex<HandlerRegistry<E>>>,
    connected: Arc<AtomicBool>,
    /// True while the link should hold (and re-establish) a connection.
    desired: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    reconnect_delay: Duration,
    shutdown_timeout: Duration,
}

impl<E> LiveLink<E>
where
    E: DeserializeOwned + Send + 'static,
{
    /// Create an idle link to `url`. No connection is opened until
    /// [`connect`](Self::connect).
    pub fn new(
        url: impl Into<String>,
        dialer: Arc<dyn Dialer>,
        reconnect_delay: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            dialer,
            handlers: Arc::new(StdMutex::new(HandlerRegistry::new())),
            connected: Arc::new(AtomicBool::new(false)),
            desired: Arc::new(AtomicBool::new(false)),
            task: None,
            shutdown_tx: None,
            reconnect_delay,
            shutdown_timeout,
        }
    }

    /// Open the connection, fully tearing down any prior one first.
    ///
    /// The prior read loop (and any pending reconnect timer) is shut down
    /// and awaited before the new loop dials, so no two live transports can
    /// exist for the same link. `is_connected` flips true only once the new
    /// dial succeeds, not when this call returns.
    pub async fn connect(&mut self) {
        self.desired.store(false, Ordering::Release);
        self.teardown().await;
        self.desired.store(true, Ordering::Release);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(tokio::spawn(run_loop::<E>(
            Arc::clone(&self.dialer),
            self.url.clone(),
            Arc::clone(&self.handlers),
            Arc::clone(&self.connected),
            Arc::clone(&self.desired),
            self.reconnect_delay,
            shutdown_rx,
        )));
    }

    /// Register a handler invoked once per successfully decoded inbound
    /// event, synchronously, in registration order.
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = lock(&self.handlers);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<StdMutex<HandlerRegistry<E>>> = Arc::downgrade(&self.handlers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(handlers) = weak.upgrade() {
                    lock(&handlers).entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Close the connection and suppress any further reconnects.
    ///
    /// Idempotent: calling this when nothing is connected is a no-op. Always
    /// ends with `is_connected() == false` and no pending reconnect timer.
    pub async fn disconnect(&mut self) {
        self.desired.store(false, Ordering::Release);
        self.teardown().await;
    }

    /// Returns `true` while a transport is open. `false` during a reconnect
    /// delay and after `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The URL this link dials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Signal the read loop to stop and await it, aborting on timeout.
    async fn teardown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("live link loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("live link loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("live link loop aborted: {join_err}");
                    }
                }
            }
        }
        self.connected.store(false, Ordering::Release);
    }
}

impl<E> std::fmt::Debug for LiveLink<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveLink")
            .field("url", &self.url)
            .field("connected", &self.connected.load(Ordering::Acquire))
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl<E> Drop for LiveLink<E> {
    fn drop(&mut self) {
        // `Drop` is synchronous, so the graceful path (async close + await)
        // is unavailable; aborting the task drops the loop future and the
        // transport with it. The abort also kills a pending reconnect sleep.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Read loop ───────────────────────────────────────────────────────

/// Outcome of one connection's read phase.
enum ReadEnd {
    /// Shutdown was requested; the transport should be closed and the loop
    /// must exit without polling the shutdown channel again.
    Shutdown,
    /// The transport errored or the server closed; eligible for reconnect.
    Lost,
}

async fn run_loop<E: DeserializeOwned>(
    dialer: Arc<dyn Dialer>,
    url: String,
    handlers: Arc<StdMutex<HandlerRegistry<E>>>,
    connected: Arc<AtomicBool>,
    desired: Arc<AtomicBool>,
    reconnect_delay: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(url = %url, "live link loop started");

    loop {
        let mut transport = tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown before dial completed");
                return;
            }
            dialed = dialer.dial(&url) => match dialed {
                Ok(transport) => transport,
                Err(e) => {
                    warn!(url = %url, "dial failed: {e}");
                    if !reconnect_wait(&mut shutdown_rx, reconnect_delay).await {
                        return;
                    }
                    if !desired.load(Ordering::Acquire) {
                        return;
                    }
                    continue;
                }
            }
        };

        connected.store(true, Ordering::Release);
        debug!(url = %url, "live connection open");

        let end = read_frames::<E>(&mut transport, &handlers, &mut shutdown_rx).await;
        connected.store(false, Ordering::Release);

        match end {
            ReadEnd::Shutdown => {
                let _ = transport.close().await;
                debug!(url = %url, "live link loop exited");
                return;
            }
            ReadEnd::Lost => drop(transport),
        }

        if !desired.load(Ordering::Acquire) {
            return;
        }
        // Exactly one reconnect attempt per loss, after the fixed delay.
        if !reconnect_wait(&mut shutdown_rx, reconnect_delay).await {
            return;
        }
        if !desired.load(Ordering::Acquire) {
            return;
        }
        debug!(url = %url, "reconnecting");
    }
}

/// Read frames until the connection ends or shutdown fires.
async fn read_frames<E: DeserializeOwned>(
    transport: &mut Box<dyn Transport>,
    handlers: &Arc<StdMutex<HandlerRegistry<E>>>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> ReadEnd {
    loop {
        tokio::select! {
            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                return ReadEnd::Shutdown;
            }
            frame = transport.recv() => match frame {
                Some(Ok(text)) => {
                    if let Some(event) = decode_event::<E>(&text) {
                        dispatch(handlers, &event);
                    }
                }
                Some(Err(e)) => {
                    error!("transport receive error: {e}");
                    return ReadEnd::Lost;
                }
                None => {
                    debug!("transport closed by server");
                    return ReadEnd::Lost;
                }
            }
        }
    }
}

/// Invoke every registered handler, in registration order.
///
/// Handlers are snapshotted out of the lock before invocation, so a handler
/// may subscribe or cancel without deadlocking.
fn dispatch<E>(handlers: &Arc<StdMutex<HandlerRegistry<E>>>, event: &E) {
    let snapshot: Vec<Handler<E>> = lock(handlers)
        .entries
        .iter()
        .map(|(_, handler)| Arc::clone(handler))
        .collect();
    for handler in snapshot {
        handler(event);
    }
}

/// Sleep for the fixed reconnect delay; `false` if shutdown fired first.
async fn reconnect_wait(shutdown_rx: &mut oneshot::Receiver<()>, delay: Duration) -> bool {
    tokio::select! {
        _ = &mut *shutdown_rx => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::{ArenaLiveError, Result};
    use crate::protocol::FineTuneEvent;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Transport that replays scripted frames, then hangs until dropped.
    struct ScriptedTransport {
        frames: VecDeque<Option<Result<String>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
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
            Ok(())
        }
    }

    /// Dialer that hands out scripted transports and counts dials.
    struct ScriptedDialer {
        scripts: StdMutex<VecDeque<Vec<Option<Result<String>>>>>,
        dials: AtomicUsize,
    }

    impl ScriptedDialer {
        fn new(scripts: Vec<Vec<Option<Result<String>>>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: StdMutex::new(scripts.into()),
                dials: AtomicUsize::new(0),
            })
        }

        fn dial_count(&self) -> usize {
            self.dials.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(&self, _url: &str) -> Result<Box<dyn Transport>> {
            self.dials.fetch_add(1, Ordering::AcqRel);
            let frames = lock(&self.scripts).pop_front().unwrap_or_default();
            Ok(Box::new(ScriptedTransport {
                frames: frames.into(),
            }))
        }
    }

    fn ft_log_frame(line: &str) -> Option<Result<String>> {
        Some(Ok(format!(
            r#"{{"type":"ft_log","job_id":"j1","data":{{"line":"{line}"}}}}"#
        )))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn dispatches_decoded_events_in_registration_order() {
        let dialer = ScriptedDialer::new(vec![vec![ft_log_frame("a"), ft_log_frame("b")]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            dialer,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        let order = Arc::new(StdMutex::new(Vec::<String>::new()));
        let first = Arc::clone(&order);
        let _sub_a = link.subscribe(move |event| {
            if let FineTuneEvent::Log { data, .. } = event {
                lock(&first).push(format!("first:{}", data.line));
            }
        });
        let second = Arc::clone(&order);
        let _sub_b = link.subscribe(move |event| {
            if let FineTuneEvent::Log { data, .. } = event {
                lock(&second).push(format!("second:{}", data.line));
            }
        });

        link.connect().await;
        settle().await;

        assert_eq!(
            *lock(&order),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
        link.disconnect().await;
    }

    #[tokio::test]
    async fn malformed_frame_never_reaches_a_handler() {
        let dialer = ScriptedDialer::new(vec![vec![
            Some(Ok("not-json".to_string())),
            Some(Ok(r#"{"type":"nonsense"}"#.to_string())),
            ft_log_frame("ok"),
        ]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            dialer,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        let seen = Arc::new(StdMutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let _sub = link.subscribe(move |event| {
            if let FineTuneEvent::Log { data, .. } = event {
                lock(&sink).push(data.line.clone());
            }
        });

        link.connect().await;
        settle().await;

        // Only the decodable frame got through.
        assert_eq!(*lock(&seen), vec!["ok"]);
        link.disconnect().await;
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_receiving() {
        let dialer = ScriptedDialer::new(vec![vec![ft_log_frame("before")]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            dialer,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        let kept_lines = Arc::new(StdMutex::new(Vec::<String>::new()));
        let kept_sink = Arc::clone(&kept_lines);
        let _kept = link.subscribe(move |event| {
            if let FineTuneEvent::Log { data, .. } = event {
                lock(&kept_sink).push(data.line.clone());
            }
        });

        let cancelled_lines = Arc::new(StdMutex::new(Vec::<String>::new()));
        let cancelled_sink = Arc::clone(&cancelled_lines);
        let cancelled = link.subscribe(move |event| {
            if let FineTuneEvent::Log { data, .. } = event {
                lock(&cancelled_sink).push(data.line.clone());
            }
        });
        cancelled.cancel();

        link.connect().await;
        settle().await;

        // The cancelled handler saw nothing; the kept one saw everything.
        assert_eq!(*lock(&kept_lines), vec!["before"]);
        assert!(lock(&cancelled_lines).is_empty());
        link.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay_and_not_before() {
        // First transport closes immediately; second stays open.
        let dialer = ScriptedDialer::new(vec![vec![None], vec![]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            Arc::clone(&dialer) as Arc<dyn Dialer>,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        link.connect().await;
        settle().await;
        assert_eq!(dialer.dial_count(), 1);
        assert!(!link.is_connected());

        // Just short of the fixed delay: no reconnect yet.
        tokio::time::advance(Duration::from_millis(1999)).await;
        settle().await;
        assert_eq!(dialer.dial_count(), 1);

        // Crossing the delay triggers exactly one new attempt.
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(dialer.dial_count(), 2);
        assert!(link.is_connected());

        link.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_repeats_until_disconnect() {
        // Every transport closes immediately.
        let dialer = ScriptedDialer::new(vec![vec![None], vec![None], vec![None], vec![None]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            Arc::clone(&dialer) as Arc<dyn Dialer>,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        link.connect().await;
        settle().await;

        for expected in 2..=4 {
            tokio::time::advance(Duration::from_millis(2000)).await;
            settle().await;
            assert_eq!(dialer.dial_count(), expected);
        }

        link.disconnect().await;
        tokio::time::advance(Duration::from_millis(4000)).await;
        settle().await;
        assert_eq!(dialer.dial_count(), 4, "no reconnect after disconnect");
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_delay_cancels_pending_reconnect() {
        let dialer = ScriptedDialer::new(vec![vec![None]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            Arc::clone(&dialer) as Arc<dyn Dialer>,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        link.connect().await;
        settle().await;
        assert_eq!(dialer.dial_count(), 1);

        // Mid-delay disconnect must kill the timer.
        tokio::time::advance(Duration::from_millis(1000)).await;
        link.disconnect().await;
        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(dialer.dial_count(), 1);
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_in_any_state() {
        let dialer = ScriptedDialer::new(vec![vec![]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            dialer,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        // Never connected.
        link.disconnect().await;
        assert!(!link.is_connected());

        link.connect().await;
        settle().await;
        assert!(link.is_connected());

        link.disconnect().await;
        link.disconnect().await;
        link.disconnect().await;
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn connect_twice_tears_down_prior_loop_first() {
        let dialer = ScriptedDialer::new(vec![vec![], vec![]]);
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            Arc::clone(&dialer) as Arc<dyn Dialer>,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        link.connect().await;
        settle().await;
        assert_eq!(dialer.dial_count(), 1);

        link.connect().await;
        settle().await;
        // Old loop gone, exactly one new dial.
        assert_eq!(dialer.dial_count(), 2);
        assert!(link.is_connected());

        link.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dial_retries_after_delay() {
        /// Dialer whose first attempt fails.
        struct FlakyDialer {
            attempts: AtomicUsize,
        }

        #[async_trait]
        impl Dialer for FlakyDialer {
            async fn dial(&self, _url: &str) -> Result<Box<dyn Transport>> {
                if self.attempts.fetch_add(1, Ordering::AcqRel) == 0 {
                    Err(ArenaLiveError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "refused",
                    )))
                } else {
                    Ok(Box::new(ScriptedTransport {
                        frames: VecDeque::new(),
                    }))
                }
            }
        }

        let dialer = Arc::new(FlakyDialer {
            attempts: AtomicUsize::new(0),
        });
        let mut link: LiveLink<FineTuneEvent> = LiveLink::new(
            "ws://test/api/v1/ws/finetuning/j1",
            Arc::clone(&dialer) as Arc<dyn Dialer>,
            Duration::from_millis(2000),
            Duration::from_secs(1),
        );

        link.connect().await;
        settle().await;
        assert!(!link.is_connected());

        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        assert!(link.is_connected());
        assert_eq!(dialer.attempts.load(Ordering::Acquire), 2);

        link.disconnect().await;
    }
}
