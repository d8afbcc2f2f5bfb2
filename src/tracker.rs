//! Polling state machine for the one order currently in flight.
//!
//! While an order is on delivery the tracker polls its status on a fixed
//! interval from a spawned task. The task carries a cancellation token:
//! `stop` cancels it and awaits the join handle, so no poll can fire into
//! a torn-down consumer. Completion persists the session, emits a one-shot
//! [`TrackerEvent::Completed`] and ends the task on its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::api::OrderingApi;
use crate::models::{Order, OrderStatus};
use crate::storage::SessionStore;
use crate::sync::SessionContext;

/// Where the tracker polls order state from. Split out from the full
/// ordering API so tests can script delivery timelines.
pub trait OrderSource: Send + Sync + 'static {
    fn fetch_order(&self, oid: i64, sid: &str) -> impl Future<Output = Result<Order>> + Send;
}

/// Polls through the full ordering API.
pub struct ApiOrderSource<A> {
    api: Arc<A>,
}

impl<A> ApiOrderSource<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

impl<A> OrderSource for ApiOrderSource<A>
where
    A: OrderingApi + 'static,
{
    fn fetch_order(&self, oid: i64, sid: &str) -> impl Future<Output = Result<Order>> + Send {
        self.api.get_order(oid, sid)
    }
}

/// Events published by the polling task.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// Fresh poll result while the order is still on delivery.
    Updated(Order),
    /// One-shot: the order reached its destination. No event follows this.
    Completed(Order),
}

/// Handle to the polling task for one tracked order.
pub struct OrderTracker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    state: watch::Receiver<Order>,
}

impl OrderTracker {
    /// Spawn the polling loop. The caller has already established that the
    /// order is on delivery.
    pub(crate) fn spawn<S: OrderSource>(
        source: Arc<S>,
        sessions: SessionStore,
        ctx: Arc<SessionContext>,
        initial: Order,
        poll_interval: Duration,
        events: mpsc::Sender<TrackerEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(poll_loop(
            source,
            sessions,
            ctx,
            initial,
            poll_interval,
            events,
            state_tx,
            task_cancel,
        ));
        Self {
            cancel,
            handle: Some(handle),
            state: state_rx,
        }
    }

    /// Last observed order state.
    pub fn current(&self) -> Order {
        self.state.borrow().clone()
    }

    /// Watch order state changes without consuming the event channel.
    pub fn subscribe(&self) -> watch::Receiver<Order> {
        self.state.clone()
    }

    /// True once the polling task has ended, whether by completion or
    /// cancellation.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel polling and wait for the task to wind down.
    ///
    /// The join is awaited before returning, so after `stop` resolves no
    /// further poll can fire. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "order tracker task failed");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop<S: OrderSource>(
    source: Arc<S>,
    sessions: SessionStore,
    ctx: Arc<SessionContext>,
    initial: Order,
    poll_interval: Duration,
    events: mpsc::Sender<TrackerEvent>,
    state: watch::Sender<Order>,
    cancel: CancellationToken,
) {
    let oid = initial.oid;
    let mut last = initial;

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The interval's first tick completes immediately; consume it so the
    // first poll lands one full interval after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(oid, "order tracking cancelled");
                persist_order(&sessions, &ctx, &last).await;
                return;
            }
            _ = ticker.tick() => {}
        }

        let sid = ctx.session.lock().await.as_ref().map(|s| s.sid.clone());
        let Some(sid) = sid else {
            warn!(oid, "session gone while tracking, stopping");
            return;
        };

        match source.fetch_order(oid, &sid).await {
            Ok(order) => {
                last = order.clone();
                state.send_replace(order.clone());

                if order.status == OrderStatus::Completed {
                    debug!(oid, "order completed, polling stops");
                    persist_order(&sessions, &ctx, &order).await;
                    let _ = events.send(TrackerEvent::Completed(order)).await;
                    return;
                }
                let _ = events.send(TrackerEvent::Updated(order)).await;
            }
            Err(e) => {
                // Transient failure; the next tick retries.
                warn!(oid, error = %e, "order poll failed");
            }
        }
    }
}

/// Fold the observed order into the session record and persist it.
async fn persist_order(sessions: &SessionStore, ctx: &SessionContext, order: &Order) {
    let mut guard = ctx.session.lock().await;
    if let Some(session) = guard.as_mut() {
        session.record_order(order.oid, order.status);
        if let Err(e) = sessions.save(session) {
            warn!(error = %e, "failed to persist session after order update");
        }
    }
}
