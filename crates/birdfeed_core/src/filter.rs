//! Per-destination subscription filtering.

use tracing::debug;

use crate::delivery::Destination;
use crate::error::Result;
use crate::post::Post;
use crate::subscriptions::{SubscriptionFlags, SubscriptionStore};

/// A subscription that survived filtering, resolved to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub flags: SubscriptionFlags,
    pub destination: Destination,
}

/// Structural validation. Fails closed: a post without an author, or a
/// quote-post whose quoted record (or its author) is missing, is dropped.
pub fn is_valid(post: &Post) -> bool {
    if post.author.is_none() {
        return false;
    }
    if post.is_quote {
        return post
            .quoted_status
            .as_deref()
            .is_some_and(|quoted| quoted.author.is_some());
    }
    true
}

fn passes_flags(flags: &SubscriptionFlags, post: &Post) -> bool {
    if flags.notext && !post.has_media() {
        return false;
    }
    if !flags.retweet && post.retweeted_status.is_some() {
        return false;
    }
    if flags.noquote && post.is_quote {
        return false;
    }
    true
}

/// Resolve the destinations interested in this post, applying per-flag
/// inclusion rules. The returned order follows the store's order.
///
/// Replies only pass when they continue the author's own thread; replies to
/// anyone else are dropped for every subscriber.
pub async fn filtered_subscriptions(
    store: &dyn SubscriptionStore,
    post: &Post,
) -> Result<Vec<DeliveryTarget>> {
    if !is_valid(post) {
        debug!("dropping structurally invalid post");
        return Ok(Vec::new());
    }
    let Some(author) = post.author.as_ref() else {
        return Ok(Vec::new());
    };

    let subscriptions = store.subscriptions_for(&author.id).await?;
    if subscriptions.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(reply_to) = post.in_reply_to_user_id.as_deref() {
        if reply_to != author.id {
            debug!(author = %author.handle, "dropping reply outside the author's own thread");
            return Ok(Vec::new());
        }
    }

    Ok(subscriptions
        .iter()
        .filter(|subscription| passes_flags(&subscription.flags, post))
        .map(|subscription| DeliveryTarget {
            flags: subscription.flags,
            destination: Destination::from(subscription),
        })
        .collect())
}
