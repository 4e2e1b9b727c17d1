//! # birdfeed-core
//!
//! Stream-resilience and text-normalization core for forwarding a live
//! social-post stream into chat channels.
//!
//! The crate is an internal library: the hosting process supplies the
//! outside world — a [`StreamConnector`] adapter over the real streaming
//! client, a [`SubscriptionStore`], a [`ChannelSink`] for delivery — and
//! this crate owns everything between those seams:
//!
//! - [`PostStream`] — the single live stream session: connect, watch for
//!   silence, reconnect with bounded exponential [`Backoff`], dispatch each
//!   validated post through filter → format → delivery.
//! - [`filtered_subscriptions`] — per-destination inclusion rules (media
//!   requirements, retweet opt-in, quote suppression, self-thread gating).
//! - [`PostFormatter`] — raw records to delivery-ready [`FormattedPost`]s,
//!   built on a code-point-safe entity rewriter (leading reply-mention
//!   stripping, mention/hashtag links, URL expansion).
//! - [`HttpUnfurler`] — optional link-preview enrichment for text-only
//!   posts; failures degrade to "no preview".
//!
//! Collaborators are taken as `Arc<dyn Trait>` so the session logic tests
//! against fakes without a live connection. All stream-event handling runs
//! on the session's supervisor task; per-post dispatch is spawned so one
//! slow post never stalls another.

pub mod backoff;
pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod post;
pub mod stream;
pub mod subscriptions;
pub mod unfurl;

#[cfg(test)]
mod test_support;

pub use backoff::Backoff;
pub use config::StreamSourceConfig;
pub use delivery::{ChannelSink, Destination};
pub use error::{BridgeError, Result};
pub use filter::{filtered_subscriptions, is_valid, DeliveryTarget};
pub use post::format::{FormattedPost, PostEmbed, PostFormatter};
pub use post::rewrite::{rewrite_post_text, RewriteMetadata, RewriteOutcome, PING_HASHTAG};
pub use post::{Author, Entities, MediaEntities, MediaKind, Post};
pub use stream::{
    PostStream, SessionState, StreamConnection, StreamConnector, StreamEvent, StreamFault,
};
pub use subscriptions::{Subscription, SubscriptionFlags, SubscriptionStore};
pub use unfurl::{HttpUnfurler, LinkPreview, LinkPreviewResolver};
