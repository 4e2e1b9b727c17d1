//! Shared fakes for exercising the core against scripted collaborators.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::delivery::{ChannelSink, Destination};
use crate::error::Result;
use crate::post::format::FormattedPost;
use crate::post::Author;
use crate::subscriptions::{Subscription, SubscriptionStore};

/// In-memory subscription store with fixed contents.
pub(crate) struct StaticStore {
    ids: Vec<String>,
    subscriptions: HashMap<String, Vec<Subscription>>,
    pub(crate) activity: Mutex<Vec<String>>,
}

impl StaticStore {
    pub(crate) fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            subscriptions: HashMap::new(),
            activity: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_subscriptions(mut self, author_id: &str, subs: Vec<Subscription>) -> Self {
        self.subscriptions.insert(author_id.to_string(), subs);
        self
    }
}

#[async_trait]
impl SubscriptionStore for StaticStore {
    async fn followed_author_ids(&self) -> Result<Vec<String>> {
        Ok(self.ids.clone())
    }

    async fn subscriptions_for(&self, author_id: &str) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .get(author_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_activity(&self, author: &Author) -> Result<()> {
        self.activity.lock().push(author.id.clone());
        Ok(())
    }
}

/// What a [`RecordingSink`] saw, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkEvent {
    Embed {
        channel: String,
        author_name: String,
        quoted: bool,
    },
    Message {
        channel: String,
        text: String,
    },
}

/// Sink that records every delivery instead of sending it anywhere.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn embed_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Embed { .. }))
            .count()
    }
}

#[async_trait]
impl ChannelSink for RecordingSink {
    async fn send_embed(&self, destination: &Destination, post: &FormattedPost) -> Result<()> {
        self.events.lock().push(SinkEvent::Embed {
            channel: destination.channel_id.clone(),
            author_name: post.embed.author_name.clone(),
            quoted: post.embed.author_name.starts_with("[QUOTED] "),
        });
        Ok(())
    }

    async fn send_message(&self, destination: &Destination, text: &str) -> Result<()> {
        self.events.lock().push(SinkEvent::Message {
            channel: destination.channel_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}
