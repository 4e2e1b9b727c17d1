//! Post → display-record formatting.
//!
//! Turns a raw record (with nested retweet/quote/long-form variants) into a
//! delivery-ready embed: author line, accent color, rewritten body, and the
//! resolved image/video/file attachments.

use std::sync::Arc;

use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::post::rewrite::{rewrite_post_text, RewriteMetadata};
use crate::post::{MediaKind, Post, VideoInfo};
use crate::unfurl::LinkPreviewResolver;

/// Embed accent colors used when the author has no theme color.
const COLOR_TEXT: u32 = 0x69b2d6;
const COLOR_VIDEO: u32 = 0x67d67d;
const COLOR_IMAGE: u32 = 0xd667cf;

/// Video renditions at or above this bitrate are skipped.
const MAX_VIDEO_BITRATE: u64 = 1_000_000;

/// Clips shorter than this attach the raw file instead of a thumbnail embed.
const SHORT_CLIP_MS: u64 = 20_000;

/// The embed half of a formatted post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEmbed {
    pub author_name: String,
    pub author_url: String,
    pub thumbnail_url: String,
    pub color: u32,
    pub description: String,
    pub image_url: Option<String>,
}

/// Delivery-ready representation of one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    pub embed: PostEmbed,
    /// Attachments delivered as separate files (multi-image posts, short clips)
    pub file_urls: Vec<String>,
    pub metadata: RewriteMetadata,
}

/// Formats raw posts, optionally enriching text-only posts with link previews.
#[derive(Clone, Default)]
pub struct PostFormatter {
    unfurler: Option<Arc<dyn LinkPreviewResolver>>,
}

impl std::fmt::Debug for PostFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFormatter")
            .field("unfurler", &self.unfurler.is_some())
            .finish()
    }
}

impl PostFormatter {
    pub fn new() -> Self {
        Self { unfurler: None }
    }

    /// Enable preview enrichment for text-only posts.
    pub fn with_unfurler(mut self, unfurler: Arc<dyn LinkPreviewResolver>) -> Self {
        self.unfurler = Some(unfurler);
        self
    }

    /// Format a post into a delivery-ready record.
    ///
    /// `quoted` marks a nested quoted post being rendered beneath its parent.
    /// Malformed URL annotations propagate as a formatting failure; an
    /// unresolvable video is logged and delivered without an attachment.
    pub async fn format(&self, post: &Post, quoted: bool) -> Result<FormattedPost> {
        let author = post.author.as_ref().ok_or_else(|| BridgeError::InvalidPost {
            reason: "post has no author".to_string(),
        })?;

        // Retweets link to the retweeted post under the retweeted author's
        // handle, while the outer author keeps the byline credit.
        let mut link_id = post.id.as_str();
        let mut link_handle = author.handle.as_str();
        if let Some(retweeted) = post.retweeted_status.as_deref() {
            if !retweeted.id.is_empty() {
                link_id = &retweeted.id;
            }
            if let Some(rt_author) = &retweeted.author {
                if !rt_author.handle.is_empty() {
                    link_handle = &rt_author.handle;
                }
            }
        }

        let text_only = !post.has_media();
        let outcome = rewrite_post_text(
            post.effective_text(),
            post.effective_entities(),
            text_only,
            self.unfurler.as_deref(),
        )
        .await?;
        let mut description = outcome.text;
        let metadata = outcome.metadata;

        let theme_color = author
            .link_color
            .as_deref()
            .and_then(|hex| u32::from_str_radix(hex, 16).ok());

        let mut image_url = None;
        let mut file_urls = Vec::new();
        let default_color;

        let media_items = if text_only {
            &[][..]
        } else {
            post.effective_media()
                .map(|m| m.media.as_slice())
                .unwrap_or(&[])
        };

        if let Some(first) = media_items.first() {
            if matches!(first.kind, MediaKind::Video | MediaKind::AnimatedGif) {
                match select_video_variant(first.video_info.as_ref()) {
                    Some(variant) => {
                        let duration = first
                            .video_info
                            .as_ref()
                            .map(|info| info.duration_ms)
                            .unwrap_or(0);
                        if duration < SHORT_CLIP_MS || variant.bitrate == 0 {
                            file_urls.push(variant.url);
                        } else {
                            image_url = Some(first.media_url.clone());
                            description = format!("{description}\n[Link to video]({})", variant.url);
                        }
                    }
                    None => {
                        warn!(
                            post_id = %post.id,
                            "video post has no usable mp4 rendition, delivering without attachment"
                        );
                    }
                }
                default_color = COLOR_VIDEO;
            } else {
                let urls: Vec<String> =
                    media_items.iter().map(|item| item.media_url.clone()).collect();
                if urls.len() == 1 {
                    image_url = urls.into_iter().next();
                } else {
                    file_urls = urls;
                }
                default_color = COLOR_IMAGE;
            }
        } else {
            image_url = metadata.preview.clone();
            default_color = COLOR_TEXT;
        }

        let quoted_prefix = if quoted { "[QUOTED] " } else { "" };
        let embed = PostEmbed {
            author_name: format!("{quoted_prefix}{} (@{})", author.name, author.handle),
            author_url: format!("https://twitter.com/{link_handle}/status/{link_id}"),
            thumbnail_url: author.avatar_url.clone(),
            color: theme_color.unwrap_or(default_color),
            description,
            image_url,
        };

        Ok(FormattedPost {
            embed,
            file_urls,
            metadata,
        })
    }
}

struct VideoSelection {
    url: String,
    bitrate: u64,
}

/// Pick the downloadable rendition: the last mp4 variant under the bitrate
/// cap. Variants without a bitrate (adaptive playlists) never match.
fn select_video_variant(info: Option<&VideoInfo>) -> Option<VideoSelection> {
    let info = info?;
    let mut selected = None;
    for variant in &info.variants {
        let Some(bitrate) = variant.bitrate else {
            continue;
        };
        if variant.content_type == "video/mp4" && bitrate < MAX_VIDEO_BITRATE {
            selected = Some(VideoSelection {
                url: strip_query(&variant.url),
                bitrate,
            });
        }
    }
    selected
}

/// Drop a trailing query string, but only when the `?` sits after the final
/// path segment (a `?` inside the path is left alone).
fn strip_query(url: &str) -> String {
    let Some(param_idx) = url.rfind('?') else {
        return url.to_string();
    };
    let slash_idx = url.rfind('/').map(|i| i as isize).unwrap_or(-1);
    if param_idx as isize > slash_idx {
        url[..param_idx].to_string()
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{
        Author, Entities, MediaEntities, MediaItem, UrlEntity, VideoVariant,
    };
    use crate::unfurl::{LinkPreview, LinkPreviewResolver};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn author() -> Author {
        Author {
            id: "7".to_string(),
            name: "Ada".to_string(),
            handle: "ada".to_string(),
            avatar_url: "https://img/ada.png".to_string(),
            link_color: None,
        }
    }

    fn text_post(body: &str) -> Post {
        Post {
            id: "100".to_string(),
            author: Some(author()),
            text: Some(body.to_string()),
            ..Default::default()
        }
    }

    fn photo(url: &str) -> MediaItem {
        MediaItem {
            kind: MediaKind::Photo,
            media_url: url.to_string(),
            video_info: None,
        }
    }

    fn video_item(thumb: &str, duration_ms: u64, variants: Vec<VideoVariant>) -> MediaItem {
        MediaItem {
            kind: MediaKind::Video,
            media_url: thumb.to_string(),
            video_info: Some(VideoInfo {
                duration_ms,
                variants,
            }),
        }
    }

    fn mp4(url: &str, bitrate: u64) -> VideoVariant {
        VideoVariant {
            bitrate: Some(bitrate),
            content_type: "video/mp4".to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn text_post_gets_text_color_and_no_attachments() {
        let record = PostFormatter::new()
            .format(&text_post("hello"), false)
            .await
            .unwrap();
        assert_eq!(record.embed.color, COLOR_TEXT);
        assert_eq!(record.embed.description, "hello");
        assert_eq!(record.embed.image_url, None);
        assert!(record.file_urls.is_empty());
        assert_eq!(record.embed.author_name, "Ada (@ada)");
        assert_eq!(
            record.embed.author_url,
            "https://twitter.com/ada/status/100"
        );
    }

    #[tokio::test]
    async fn authorless_post_is_a_formatting_error() {
        let post = Post {
            text: Some("orphan".to_string()),
            ..Default::default()
        };
        let result = PostFormatter::new().format(&post, false).await;
        assert!(matches!(result, Err(BridgeError::InvalidPost { .. })));
    }

    #[tokio::test]
    async fn theme_color_overrides_kind_default() {
        let mut post = text_post("hello");
        post.author.as_mut().unwrap().link_color = Some("FF8800".to_string());
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.color, 0xFF8800);
    }

    #[tokio::test]
    async fn unparsable_theme_color_falls_back_to_default() {
        let mut post = text_post("hello");
        post.author.as_mut().unwrap().link_color = Some("not-hex".to_string());
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.color, COLOR_TEXT);
    }

    #[tokio::test]
    async fn quoted_posts_carry_the_quoted_prefix() {
        let record = PostFormatter::new()
            .format(&text_post("inner"), true)
            .await
            .unwrap();
        assert_eq!(record.embed.author_name, "[QUOTED] Ada (@ada)");
    }

    #[tokio::test]
    async fn single_image_is_embedded_inline() {
        let mut post = text_post("pic");
        post.extended_entities = Some(MediaEntities {
            media: vec![photo("https://img/1.jpg")],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.image_url.as_deref(), Some("https://img/1.jpg"));
        assert!(record.file_urls.is_empty());
        assert_eq!(record.embed.color, COLOR_IMAGE);
    }

    #[tokio::test]
    async fn multi_image_posts_become_file_attachments_in_order() {
        let mut post = text_post("pics");
        post.extended_entities = Some(MediaEntities {
            media: vec![
                photo("https://img/1.jpg"),
                photo("https://img/2.jpg"),
                photo("https://img/3.jpg"),
            ],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.image_url, None);
        assert_eq!(
            record.file_urls,
            vec![
                "https://img/1.jpg".to_string(),
                "https://img/2.jpg".to_string(),
                "https://img/3.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn retweet_inherits_media_and_link_target() {
        let mut post = text_post("RT pic");
        post.retweeted_status = Some(Box::new(Post {
            id: "55".to_string(),
            author: Some(Author {
                handle: "orig".to_string(),
                ..Default::default()
            }),
            extended_entities: Some(MediaEntities {
                media: vec![photo("https://img/rt.jpg")],
            }),
            ..Default::default()
        }));
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.image_url.as_deref(), Some("https://img/rt.jpg"));
        assert!(record.file_urls.is_empty());
        // Byline stays with the outer author, the link goes to the original.
        assert_eq!(record.embed.author_name, "Ada (@ada)");
        assert_eq!(
            record.embed.author_url,
            "https://twitter.com/orig/status/55"
        );
    }

    #[tokio::test]
    async fn short_clip_attaches_the_raw_file() {
        let mut post = text_post("clip");
        post.extended_entities = Some(MediaEntities {
            media: vec![video_item(
                "https://img/thumb.jpg",
                8_000,
                vec![mp4("https://video/clip.mp4?tag=1", 640_000)],
            )],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.file_urls, vec!["https://video/clip.mp4".to_string()]);
        assert_eq!(record.embed.image_url, None);
        assert_eq!(record.embed.color, COLOR_VIDEO);
    }

    #[tokio::test]
    async fn long_video_embeds_thumbnail_and_appends_link() {
        let mut post = text_post("movie");
        post.extended_entities = Some(MediaEntities {
            media: vec![video_item(
                "https://img/thumb.jpg",
                95_000,
                vec![mp4("https://video/full.mp4", 820_000)],
            )],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(
            record.embed.image_url.as_deref(),
            Some("https://img/thumb.jpg")
        );
        assert!(record.file_urls.is_empty());
        assert_eq!(
            record.embed.description,
            "movie\n[Link to video](https://video/full.mp4)"
        );
    }

    #[tokio::test]
    async fn zero_bitrate_rendition_is_attached_directly() {
        let mut post = text_post("gif");
        post.extended_entities = Some(MediaEntities {
            media: vec![video_item(
                "https://img/thumb.jpg",
                60_000,
                vec![mp4("https://video/loop.mp4", 0)],
            )],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.file_urls, vec!["https://video/loop.mp4".to_string()]);
    }

    #[tokio::test]
    async fn last_eligible_rendition_wins() {
        let mut post = text_post("movie");
        post.extended_entities = Some(MediaEntities {
            media: vec![video_item(
                "https://img/thumb.jpg",
                5_000,
                vec![
                    mp4("https://video/low.mp4", 320_000),
                    VideoVariant {
                        bitrate: None,
                        content_type: "application/x-mpegURL".to_string(),
                        url: "https://video/playlist.m3u8".to_string(),
                    },
                    mp4("https://video/high.mp4", 832_000),
                    mp4("https://video/too-big.mp4", 2_176_000),
                ],
            )],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.file_urls, vec!["https://video/high.mp4".to_string()]);
    }

    #[tokio::test]
    async fn video_without_usable_rendition_delivers_bare() {
        let mut post = text_post("broken");
        post.extended_entities = Some(MediaEntities {
            media: vec![video_item(
                "https://img/thumb.jpg",
                5_000,
                vec![VideoVariant {
                    bitrate: None,
                    content_type: "application/x-mpegURL".to_string(),
                    url: "https://video/playlist.m3u8".to_string(),
                }],
            )],
        });
        let record = PostFormatter::new().format(&post, false).await.unwrap();
        assert_eq!(record.embed.image_url, None);
        assert!(record.file_urls.is_empty());
        assert_eq!(record.embed.color, COLOR_VIDEO);
        assert_eq!(record.embed.description, "broken");
    }

    struct FixedUnfurler;

    #[async_trait]
    impl LinkPreviewResolver for FixedUnfurler {
        async fn unfurl(&self, _url: &str) -> crate::error::Result<LinkPreview> {
            Ok(LinkPreview {
                og_image: Some("https://og.example/preview.png".to_string()),
                card_image: None,
            })
        }
    }

    #[tokio::test]
    async fn text_post_preview_becomes_the_embed_image() {
        let mut post = text_post("see link1");
        post.entities = Some(Entities {
            urls: vec![UrlEntity {
                expanded_url: Some("https://example.com/article".to_string()),
                indices: vec![4, 9],
            }],
            ..Default::default()
        });
        let record = PostFormatter::new()
            .with_unfurler(Arc::new(FixedUnfurler))
            .format(&post, false)
            .await
            .unwrap();
        assert_eq!(
            record.embed.image_url.as_deref(),
            Some("https://og.example/preview.png")
        );
        assert_eq!(record.embed.description, "see https://example.com/article");
    }

    #[test]
    fn query_strings_are_stripped_only_after_the_last_segment() {
        assert_eq!(strip_query("https://v/x.mp4?tag=1"), "https://v/x.mp4");
        assert_eq!(strip_query("https://v/x.mp4"), "https://v/x.mp4");
        assert_eq!(strip_query("https://v/a?b/x.mp4"), "https://v/a?b/x.mp4");
    }
}
