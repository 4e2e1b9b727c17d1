//! Stream session management: connection lifecycle, reconnection, dispatch.
//!
//! [`PostStream`] owns the single live connection to the post source. The
//! real streaming client sits behind the [`StreamConnector`] seam, feeding
//! [`StreamEvent`]s into the session's supervisor task; the manager's
//! transition logic (backoff, rate-limit cooldown, silence watchdog) stays
//! unit-testable without a network.

mod session;


use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};

use crate::backoff::Backoff;
use crate::config::StreamSourceConfig;
use crate::delivery::ChannelSink;
use crate::error::{BridgeError, Result};
use crate::post::format::PostFormatter;
use crate::post::Post;
use crate::subscriptions::SubscriptionStore;
use crate::unfurl::LinkPreviewResolver;

use session::SessionInner;

pub use session::SessionState;

/// HTTP status the source uses to signal rate limiting.
pub(crate) const RATE_LIMIT_STATUS: u16 = 420;

/// Connection-level fault surfaced by the stream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    pub url: String,
    pub status: u16,
    pub status_text: String,
}

impl StreamFault {
    /// Classify this fault into the crate error taxonomy.
    pub fn to_error(&self) -> BridgeError {
        if self.status == RATE_LIMIT_STATUS {
            BridgeError::RateLimited {
                url: self.url.clone(),
            }
        } else {
            BridgeError::StreamFault {
                url: self.url.clone(),
                status: self.status,
                status_text: self.status_text.clone(),
            }
        }
    }
}

/// Events surfaced by a live stream connection.
#[derive(Debug)]
pub enum StreamEvent {
    /// The connection is established and will begin delivering posts
    Started,
    /// One raw post record
    Post(Box<Post>),
    /// The source reported a connection-level error
    Error(StreamFault),
    /// The source closed the stream
    End,
}

/// A live connection: an event receiver with an explicit disconnect.
#[derive(Debug)]
pub struct StreamConnection {
    events: mpsc::Receiver<StreamEvent>,
}

impl StreamConnection {
    pub fn new(events: mpsc::Receiver<StreamEvent>) -> Self {
        Self { events }
    }

    /// Stop accepting events from the source.
    pub fn disconnect(&mut self) {
        self.events.close();
    }

    pub(crate) async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

/// Adapter over the real streaming client.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a connection filtered to the given author ids.
    async fn open(&self, author_ids: &[String]) -> Result<StreamConnection>;
}

/// Handle to the process-wide post stream session.
///
/// Cheap to clone (all clones share one session). The hosting process keeps
/// exactly one of these; [`PostStream::create`] refuses to open a second
/// live connection, and recreation after [`PostStream::destroy`] reuses the
/// same manager object.
pub struct PostStream {
    inner: Arc<SessionInner>,
}

impl Clone for PostStream {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for PostStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStream")
            .field("name", &self.inner.config.name)
            .field("state", &*self.inner.state.read())
            .finish()
    }
}

impl PostStream {
    pub fn new(
        config: StreamSourceConfig,
        connector: Arc<dyn StreamConnector>,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn ChannelSink>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff_start_ms, config.backoff_max_ms);
        Self {
            inner: Arc::new(SessionInner {
                config,
                connector,
                store,
                sink,
                formatter: PostFormatter::new(),
                state: RwLock::new(SessionState::Absent),
                backoff: Mutex::new(backoff),
                last_event: RwLock::new(None),
                shutdown_tx: RwLock::new(None),
            }),
        }
    }

    /// Attach a link-preview resolver. A no-op unless the config enables
    /// preview enrichment. Must be called before [`PostStream::create`].
    pub fn with_unfurler(self, unfurler: Arc<dyn LinkPreviewResolver>) -> Self {
        if !self.inner.config.unfurl_previews {
            return self;
        }
        let inner = &self.inner;
        let backoff = Backoff::new(inner.config.backoff_start_ms, inner.config.backoff_max_ms);
        Self {
            inner: Arc::new(SessionInner {
                config: inner.config.clone(),
                connector: Arc::clone(&inner.connector),
                store: Arc::clone(&inner.store),
                sink: Arc::clone(&inner.sink),
                formatter: inner.formatter.clone().with_unfurler(unfurler),
                state: RwLock::new(SessionState::Absent),
                backoff: Mutex::new(backoff),
                last_event: RwLock::new(None),
                shutdown_tx: RwLock::new(None),
            }),
        }
    }

    /// Open the stream session.
    ///
    /// Fetches the current followed-author set; if it is empty the session
    /// stays [`SessionState::Absent`] without opening a connection. The
    /// supervisor task re-fetches the set on every reconnect, so subscription
    /// changes are picked up as the session cycles.
    pub async fn create(&self) -> Result<()> {
        if *self.inner.state.read() != SessionState::Absent {
            return Err(BridgeError::SessionAlreadyLive);
        }
        *self.inner.state.write() = SessionState::Connecting;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.inner.shutdown_tx.write() = Some(shutdown_tx);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.supervisor_loop(shutdown_rx).await;
        });
        Ok(())
    }

    /// Close the connection and stop reconnecting. The manager object stays
    /// usable; a later [`PostStream::create`] opens a fresh session.
    pub async fn destroy(&self) {
        if let Some(tx) = self.inner.shutdown_tx.write().take() {
            let _ = tx.send(());
        }
        *self.inner.state.write() = SessionState::Absent;
        *self.inner.last_event.write() = None;
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }
}
