//! Delivery-channel boundary.
//!
//! Rendering and transport belong to the hosting process; this core hands
//! finished [`FormattedPost`] records across this seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::post::format::FormattedPost;
use crate::subscriptions::Subscription;

/// A resolved delivery destination: a channel or a direct-message target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub channel_id: String,
    #[serde(default)]
    pub is_direct: bool,
}

impl Destination {
    pub fn new(channel_id: impl Into<String>, is_direct: bool) -> Self {
        Self {
            channel_id: channel_id.into(),
            is_direct,
        }
    }
}

impl From<&Subscription> for Destination {
    fn from(subscription: &Subscription) -> Self {
        Self::new(subscription.channel_id.clone(), subscription.is_direct)
    }
}

/// Sink for formatted posts and plain notices.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Deliver a formatted post (embed plus any file attachments).
    async fn send_embed(&self, destination: &Destination, post: &FormattedPost) -> Result<()>;

    /// Deliver a plain text message (broadcast-attention pings).
    async fn send_message(&self, destination: &Destination, text: &str) -> Result<()>;
}
