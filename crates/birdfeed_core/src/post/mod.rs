//! Raw post records as they arrive off the stream.
//!
//! These structs deserialize directly from the source's JSON payloads
//! (`serde` renames cover the wire field names), so every field the wire may
//! omit is an `Option` or defaulted. Entity index spans are measured in
//! Unicode code points over the original text, `[start, end)`.

pub mod format;
pub mod rewrite;

use serde::Deserialize;

/// One item from the ingested content stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default, rename = "id_str")]
    pub id: String,
    #[serde(default, rename = "user")]
    pub author: Option<Author>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub extended_entities: Option<MediaEntities>,
    /// Long-form variant used when the body exceeds the short-form limit
    #[serde(default, rename = "extended_tweet")]
    pub extended_post: Option<ExtendedPost>,
    #[serde(default)]
    pub retweeted_status: Option<Box<Post>>,
    #[serde(default)]
    pub quoted_status: Option<Box<Post>>,
    #[serde(default, rename = "is_quote_status")]
    pub is_quote: bool,
    #[serde(default, rename = "in_reply_to_user_id_str")]
    pub in_reply_to_user_id: Option<String>,
}

/// Post author as embedded in the record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default, rename = "id_str")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "screen_name")]
    pub handle: String,
    #[serde(default, rename = "profile_image_url_https")]
    pub avatar_url: String,
    /// Theme color as a bare hex string, when the author set one
    #[serde(default, rename = "profile_link_color")]
    pub link_color: Option<String>,
}

/// Long-form body variant carrying its own text and entity sets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedPost {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub extended_entities: Option<MediaEntities>,
}

/// Index-tagged annotations over the post text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    #[serde(default, rename = "user_mentions")]
    pub mentions: Vec<MentionEntity>,
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub hashtags: Vec<HashtagEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentionEntity {
    #[serde(default, rename = "screen_name")]
    pub handle: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlEntity {
    /// Unshortened destination URL
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashtagEntity {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
}

/// Attached media descriptors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntities {
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaItem {
    #[serde(default, rename = "type")]
    pub kind: MediaKind,
    #[serde(default, rename = "media_url_https")]
    pub media_url: String,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Photo,
    Video,
    AnimatedGif,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default, rename = "duration_millis")]
    pub duration_ms: u64,
    #[serde(default)]
    pub variants: Vec<VideoVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoVariant {
    /// Absent for adaptive (playlist) renditions
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub url: String,
}

impl Post {
    /// Whether any entity set (own, long-form, or retweeted) carries media.
    /// Posts without media are "text-only" for formatting purposes.
    pub fn has_media(&self) -> bool {
        let own = self
            .extended_entities
            .as_ref()
            .is_some_and(|m| !m.media.is_empty());
        let long_form = self
            .extended_post
            .as_ref()
            .and_then(|e| e.extended_entities.as_ref())
            .is_some_and(|m| !m.media.is_empty());
        let retweeted = self
            .retweeted_status
            .as_deref()
            .and_then(|r| r.extended_entities.as_ref())
            .is_some_and(|m| !m.media.is_empty());
        own || long_form || retweeted
    }

    /// Effective body text, preferring the long-form variant when present.
    pub fn effective_text(&self) -> &str {
        if let Some(ext) = &self.extended_post {
            if let Some(text) = ext.full_text.as_deref().or(ext.text.as_deref()) {
                return text;
            }
        }
        self.full_text
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    /// Entity annotations matching [`Post::effective_text`]. The long-form
    /// variant's entities replace the outer ones entirely when present.
    pub fn effective_entities(&self) -> Option<&Entities> {
        match &self.extended_post {
            Some(ext) => ext.entities.as_ref(),
            None => self.entities.as_ref(),
        }
    }

    /// Media to render: the long-form variant's set when present, otherwise
    /// the post's own, inheriting from the retweeted post as a fallback
    /// (retweets carry no media of their own).
    pub fn effective_media(&self) -> Option<&MediaEntities> {
        let own = match &self.extended_post {
            Some(ext) => ext.extended_entities.as_ref(),
            None => self.extended_entities.as_ref(),
        };
        own.filter(|m| !m.media.is_empty()).or_else(|| {
            self.retweeted_status
                .as_deref()
                .and_then(|r| r.extended_entities.as_ref())
                .filter(|m| !m.media.is_empty())
        })
    }
}
