//! Session state machine and supervisor loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::StreamSourceConfig;
use crate::delivery::ChannelSink;
use crate::error::Result;
use crate::filter::filtered_subscriptions;
use crate::post::format::PostFormatter;
use crate::post::Post;
use crate::stream::{
    StreamConnection, StreamConnector, StreamEvent, StreamFault, RATE_LIMIT_STATUS,
};
use crate::subscriptions::SubscriptionStore;

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live session (never created, or explicitly destroyed)
    Absent,
    /// Between connections: opening one, or waiting out a reconnect delay
    Connecting,
    /// Connected and receiving events
    Live,
}

/// Shared state between the [`super::PostStream`] handle and its supervisor task.
pub(super) struct SessionInner {
    pub(super) config: StreamSourceConfig,
    pub(super) connector: Arc<dyn StreamConnector>,
    pub(super) store: Arc<dyn SubscriptionStore>,
    pub(super) sink: Arc<dyn ChannelSink>,
    pub(super) formatter: PostFormatter,
    pub(super) state: RwLock<SessionState>,
    pub(super) backoff: Mutex<Backoff>,
    /// Arms the silence watchdog; `None` until the connection reports start
    pub(super) last_event: RwLock<Option<Instant>>,
    pub(super) shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
}

/// Why a connection stopped being driven.
enum DriveOutcome {
    Ended,
    Fault(StreamFault),
    Stale,
    Shutdown,
}

impl SessionInner {
    /// Owns connection, processing, and reconnection until shutdown.
    ///
    /// On shutdown this returns without touching state: `destroy` already
    /// marked the session absent, and a successor session may have been
    /// created since. Only a natural exit (nothing to follow) writes state.
    pub(super) async fn supervisor_loop(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            if shutdown_requested(&mut shutdown_rx) {
                return;
            }
            *self.state.write() = SessionState::Connecting;

            let author_ids = match self.store.followed_author_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    let delay = self.reconnect_delay_on_end();
                    warn!(
                        "{}: followed-author lookup failed: {e}; retrying in {delay:?}",
                        self.config.name
                    );
                    if !self.sleep_or_shutdown(delay, &mut shutdown_rx).await {
                        return;
                    }
                    continue;
                }
            };
            if author_ids.is_empty() {
                info!(
                    "{}: no followed authors, leaving the stream closed",
                    self.config.name
                );
                *self.state.write() = SessionState::Absent;
                return;
            }

            let mut connection = match self.connector.open(&author_ids).await {
                Ok(connection) => connection,
                Err(e) => {
                    let delay = self.reconnect_delay_on_end();
                    warn!(
                        "{}: connection attempt failed: {e}; reconnecting in {delay:?}",
                        self.config.name
                    );
                    if !self.sleep_or_shutdown(delay, &mut shutdown_rx).await {
                        return;
                    }
                    continue;
                }
            };

            let outcome = self.drive(&mut connection, &mut shutdown_rx).await;
            connection.disconnect();
            *self.last_event.write() = None;

            let delay = match outcome {
                DriveOutcome::Shutdown => return,
                DriveOutcome::Stale => {
                    warn!(
                        "{}: stream silent for {}ms, recreating the session",
                        self.config.name, self.config.watchdog_timeout_ms
                    );
                    *self.state.write() = SessionState::Connecting;
                    Duration::ZERO
                }
                DriveOutcome::Fault(fault) => {
                    let delay = self.reconnect_delay_for_fault(&fault);
                    warn!(
                        "{}: {}; reconnecting in {delay:?}",
                        self.config.name,
                        fault.to_error()
                    );
                    delay
                }
                DriveOutcome::Ended => {
                    let delay = self.reconnect_delay_on_end();
                    info!(
                        "{}: stream ended; reconnecting in {delay:?}",
                        self.config.name
                    );
                    delay
                }
            };

            if !self.sleep_or_shutdown(delay, &mut shutdown_rx).await {
                return;
            }
        }
    }

    /// Pump one connection's events until it dies, goes silent, or we shut
    /// down. The watchdog deadline re-arms on start and on every post.
    async fn drive(
        self: &Arc<Self>,
        connection: &mut StreamConnection,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> DriveOutcome {
        let watchdog = Duration::from_millis(self.config.watchdog_timeout_ms);
        loop {
            let deadline = (*self.last_event.read()).map(|armed| armed + watchdog);
            tokio::select! {
                event = connection.next_event() => match event {
                    Some(StreamEvent::Started) => self.on_stream_start(),
                    Some(StreamEvent::Post(post)) => {
                        *self.last_event.write() = Some(Instant::now());
                        self.spawn_dispatch(*post);
                    }
                    Some(StreamEvent::Error(fault)) => return DriveOutcome::Fault(fault),
                    Some(StreamEvent::End) | None => return DriveOutcome::Ended,
                },
                _ = watchdog_expired(deadline) => return DriveOutcome::Stale,
                _ = &mut *shutdown_rx => return DriveOutcome::Shutdown,
            }
        }
    }

    /// Connection established: reset backoff and arm the silence watchdog.
    pub(super) fn on_stream_start(&self) {
        info!("{}: stream successfully started", self.config.name);
        self.backoff.lock().reset();
        *self.last_event.write() = Some(Instant::now());
        *self.state.write() = SessionState::Live;
    }

    /// Rate-limit responses get a fixed cooldown and leave backoff untouched;
    /// anything else consumes the current backoff value and grows it.
    pub(super) fn reconnect_delay_for_fault(&self, fault: &StreamFault) -> Duration {
        *self.state.write() = SessionState::Connecting;
        if fault.status == RATE_LIMIT_STATUS {
            Duration::from_millis(self.config.rate_limit_cooldown_ms)
        } else {
            let mut backoff = self.backoff.lock();
            let delay = backoff.delay();
            backoff.increment();
            delay
        }
    }

    pub(super) fn reconnect_delay_on_end(&self) -> Duration {
        *self.state.write() = SessionState::Connecting;
        let mut backoff = self.backoff.lock();
        let delay = backoff.delay();
        backoff.increment();
        delay
    }

    /// Each post is dispatched on its own task: formatting may suspend on a
    /// preview fetch and must not hold up unrelated posts.
    fn spawn_dispatch(self: &Arc<Self>, post: Post) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = inner.dispatch_post(&post).await {
                warn!("{}: dropping post {}: {e}", inner.config.name, post.id);
            }
        });
    }

    /// Filter → format → deliver one post. Per-target delivery failures are
    /// logged and do not stop delivery to the remaining targets.
    pub(super) async fn dispatch_post(&self, post: &Post) -> Result<()> {
        let targets = filtered_subscriptions(self.store.as_ref(), post).await?;
        if targets.is_empty() {
            return Ok(());
        }

        let formatted = self.formatter.format(post, false).await?;
        for target in &targets {
            if formatted.metadata.ping && target.flags.ping {
                debug!(
                    "{}: pinging {}",
                    self.config.name, target.destination.channel_id
                );
                if let Err(e) = self.sink.send_message(&target.destination, "@everyone").await {
                    warn!(
                        "{}: ping to {} failed: {e}",
                        self.config.name, target.destination.channel_id
                    );
                }
            }
            if let Err(e) = self.sink.send_embed(&target.destination, &formatted).await {
                warn!(
                    "{}: delivery to {} failed: {e}",
                    self.config.name, target.destination.channel_id
                );
            }
        }

        if post.is_quote {
            if let Some(quoted) = post.quoted_status.as_deref() {
                match self.formatter.format(quoted, true).await {
                    Ok(quoted_record) => {
                        for target in targets.iter().filter(|t| !t.flags.noquote) {
                            if let Err(e) =
                                self.sink.send_embed(&target.destination, &quoted_record).await
                            {
                                warn!(
                                    "{}: quoted delivery to {} failed: {e}",
                                    self.config.name, target.destination.channel_id
                                );
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{}: quoted post of {} failed to format: {e}",
                            self.config.name, post.id
                        );
                    }
                }
            }
        }

        if let Some(author) = post.author.as_ref() {
            if let Err(e) = self.store.record_activity(author).await {
                warn!(
                    "{}: activity bookkeeping for @{} failed: {e}",
                    self.config.name, author.handle
                );
            }
        }
        Ok(())
    }

    /// Wait out a reconnect delay. Returns `false` if shutdown arrived.
    async fn sleep_or_shutdown(
        &self,
        delay: Duration,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> bool {
        if delay.is_zero() {
            return !shutdown_requested(shutdown_rx);
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = &mut *shutdown_rx => false,
        }
    }
}

fn shutdown_requested(shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        shutdown_rx.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}

async fn watchdog_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
