//! Subscription model and the external store boundary.
//!
//! The store itself (persistence, lookups) lives in the hosting process;
//! this core only reads subscriptions and reports author activity back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::post::Author;

/// Per-destination inclusion switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFlags {
    /// Deliver only posts that carry media
    #[serde(default)]
    pub notext: bool,
    /// Deliver retweets as well as originals
    #[serde(default)]
    pub retweet: bool,
    /// Suppress the nested quoted post of quote-posts
    #[serde(default)]
    pub noquote: bool,
    /// Send a broadcast-attention message when a post requests one
    #[serde(default)]
    pub ping: bool,
}

/// One stored subscription: a destination channel following one author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub flags: SubscriptionFlags,
    pub channel_id: String,
    #[serde(default)]
    pub is_direct: bool,
}

/// Read-only view of the external subscription store.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Ids of every author at least one destination follows.
    async fn followed_author_ids(&self) -> Result<Vec<String>>;

    /// Subscriptions interested in a specific author.
    async fn subscriptions_for(&self, author_id: &str) -> Result<Vec<Subscription>>;

    /// Record that an author was seen posting (last-seen bookkeeping).
    async fn record_activity(&self, author: &Author) -> Result<()>;
}
