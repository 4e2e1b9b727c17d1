//! Position-preserving rich-text rewriting.
//!
//! Rewrites a post body using its index-tagged annotations: a leading run of
//! reply-mentions is stripped, remaining mentions and hashtags become
//! markdown links, and shortened URLs are expanded in place. Spans index the
//! NFC-normalized code-point sequence of the original text, so replacements
//! are applied over a `Vec<char>` with a running offset rather than over
//! UTF-8 byte positions.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::{BridgeError, Result};
use crate::post::{Entities, HashtagEntity, MentionEntity};
use crate::unfurl::LinkPreviewResolver;

/// Hashtag that requests a broadcast-attention ping, compared case-insensitively.
pub const PING_HASHTAG: &str = "qtweet";

/// The source appends shortened media links to the body; everything from the
/// first occurrence on is dropped since media is rendered separately.
const SHORTLINK_MARKER: &str = "https://t.co/";

/// Signals extracted while rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteMetadata {
    /// A trigger hashtag asked for a broadcast-attention ping
    pub ping: bool,
    /// Social preview image resolved for a text-only post
    pub preview: Option<String>,
}

/// Rewritten body text plus extracted signals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub text: String,
    pub metadata: RewriteMetadata,
}

/// One replacement over the code-point view of the text, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpanChange {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Rewrite a post body using its entity annotations.
///
/// Mentions and hashtags with a missing handle/text or a span that is not
/// exactly two indices are skipped; URL annotations are held to a stricter
/// standard and fail the whole rewrite, since a silently dropped URL would
/// corrupt the surrounding span arithmetic for the reader.
///
/// For text-only posts, at most one link-preview fetch is attempted (against
/// the first URL of the reverse walk); any failure degrades to no preview.
pub async fn rewrite_post_text(
    text: &str,
    entities: Option<&Entities>,
    text_only: bool,
    unfurler: Option<&dyn LinkPreviewResolver>,
) -> Result<RewriteOutcome> {
    let Some(entities) = entities else {
        return Ok(RewriteOutcome {
            text: text.to_string(),
            metadata: RewriteMetadata::default(),
        });
    };

    let mut changes = Vec::new();
    let mut metadata = RewriteMetadata::default();

    collect_mention_changes(&entities.mentions, &mut changes);

    // URL spans, newest-listed first; only the first one is eligible for the
    // preview fetch.
    let mut preview_attempted = false;
    for url in entities.urls.iter().rev() {
        let (Some(expanded), Some((start, end))) =
            (url.expanded_url.as_deref(), parse_span(&url.indices))
        else {
            return Err(BridgeError::InvalidEntity {
                reason: "URL annotation missing expanded URL or index span".to_string(),
            });
        };
        if text_only && !preview_attempted {
            preview_attempted = true;
            if let Some(unfurler) = unfurler {
                metadata.preview = fetch_preview(unfurler, expanded).await;
            }
        }
        changes.push(SpanChange {
            start,
            end,
            replacement: expanded.to_string(),
        });
    }

    collect_hashtag_changes(&entities.hashtags, &mut changes, &mut metadata);

    let text = tidy_text(apply_changes(text, changes));
    Ok(RewriteOutcome { text, metadata })
}

fn parse_span(indices: &[usize]) -> Option<(usize, usize)> {
    match indices {
        [start, end] => Some((*start, *end)),
        _ => None,
    }
}

/// Leading reply-mentions (a run of mentions pinned to the front of the
/// text) are dropped along with one separator character each; once the run
/// breaks, every later mention becomes a profile link instead.
fn collect_mention_changes(mentions: &[MentionEntity], changes: &mut Vec<SpanChange>) {
    let mut in_replies = true;
    let mut reply_index = 0usize;
    for mention in mentions {
        let (Some(handle), Some((start, end))) =
            (mention.handle.as_deref(), parse_span(&mention.indices))
        else {
            continue;
        };
        if handle.is_empty() {
            continue;
        }
        if in_replies && start == reply_index {
            changes.push(SpanChange {
                start,
                end: end + 1,
                replacement: String::new(),
            });
            reply_index = end + 1;
        } else {
            in_replies = false;
            let display = mention
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(handle);
            changes.push(SpanChange {
                start,
                end,
                replacement: format!("[@{display}](https://twitter.com/{handle})"),
            });
        }
    }
}

fn collect_hashtag_changes(
    hashtags: &[HashtagEntity],
    changes: &mut Vec<SpanChange>,
    metadata: &mut RewriteMetadata,
) {
    for hashtag in hashtags {
        let (Some(tag), Some((start, end))) =
            (hashtag.text.as_deref(), parse_span(&hashtag.indices))
        else {
            continue;
        };
        if tag.is_empty() {
            continue;
        }
        changes.push(SpanChange {
            start,
            end,
            replacement: format!("[#{tag}](https://twitter.com/hashtag/{tag}?src=hash)"),
        });
        if tag.eq_ignore_ascii_case(PING_HASHTAG) {
            metadata.ping = true;
        }
    }
}

/// Apply replacement spans over the code-point view of `text`.
///
/// Changes are stably sorted ascending by start; a running offset carries the
/// cumulative length drift of earlier replacements so later spans (which
/// index the original text) land in the right place. Adjusted indices are
/// clamped to the current sequence bounds.
pub(crate) fn apply_changes(text: &str, mut changes: Vec<SpanChange>) -> String {
    let mut code_points: Vec<char> = text.nfc().collect();
    let mut offset: isize = 0;

    changes.sort_by_key(|change| change.start);
    for change in changes {
        let replacement: Vec<char> = change.replacement.nfc().collect();
        let len = code_points.len();
        let start = clamp_index(change.start as isize + offset, len);
        let end = clamp_index(change.end as isize + offset, len).max(start);
        code_points.splice(start..end, replacement.iter().copied());
        offset += replacement.len() as isize - (change.end as isize - change.start as isize);
    }

    code_points.into_iter().collect()
}

fn clamp_index(value: isize, len: usize) -> usize {
    if value < 0 {
        0
    } else {
        (value as usize).min(len)
    }
}

/// Unescape the entity references the source emits, then cut the body at the
/// first auto-appended short-link.
fn tidy_text(joined: String) -> String {
    let unescaped = joined
        .replace("&amp;", "&")
        .replace("&gt;", ">")
        .replace("&lt;", "<");
    match unescaped.find(SHORTLINK_MARKER) {
        Some(idx) => unescaped[..idx].to_string(),
        None => unescaped,
    }
}

async fn fetch_preview(unfurler: &dyn LinkPreviewResolver, url: &str) -> Option<String> {
    match unfurler.unfurl(url).await {
        Ok(preview) => {
            let candidate = preview.card_image.or(preview.og_image)?;
            normalize_preview_url(candidate)
        }
        Err(e) => {
            debug!("link preview for {url} failed: {e}");
            None
        }
    }
}

/// Protocol-relative preview URLs upgrade to `https:`; anything else that is
/// not already absolute is discarded rather than guessed at.
pub(crate) fn normalize_preview_url(candidate: String) -> Option<String> {
    if let Some(rest) = candidate.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    candidate.starts_with("http").then_some(candidate)
}
