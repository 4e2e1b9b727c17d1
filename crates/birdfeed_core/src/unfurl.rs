//! External link unfurling for social preview images.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{BridgeError, Result};

/// Social preview metadata extracted from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPreview {
    pub og_image: Option<String>,
    pub card_image: Option<String>,
}

/// Resolver for social preview metadata. Callers treat any failure as
/// "no preview"; nothing downstream depends on this succeeding.
#[async_trait]
pub trait LinkPreviewResolver: Send + Sync {
    async fn unfurl(&self, url: &str) -> Result<LinkPreview>;
}

/// reqwest-backed resolver reading `twitter:image` / `og:image` meta tags.
#[derive(Debug, Clone, Default)]
pub struct HttpUnfurler {
    client: reqwest::Client,
}

impl HttpUnfurler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkPreviewResolver for HttpUnfurler {
    async fn unfurl(&self, url: &str) -> Result<LinkPreview> {
        let parsed = Url::parse(url).map_err(|e| BridgeError::Enrichment {
            url: url.to_string(),
            cause: e.to_string(),
        })?;
        let response =
            self.client
                .get(parsed)
                .send()
                .await
                .map_err(|e| BridgeError::Enrichment {
                    url: url.to_string(),
                    cause: e.to_string(),
                })?;
        let body = response.text().await.map_err(|e| BridgeError::Enrichment {
            url: url.to_string(),
            cause: e.to_string(),
        })?;
        Ok(extract_preview(&body))
    }
}

/// Pull preview image candidates out of a fetched page.
pub fn extract_preview(html: &str) -> LinkPreview {
    let document = Html::parse_document(html);
    LinkPreview {
        card_image: meta_content(
            &document,
            &[
                "meta[name='twitter:image']",
                "meta[property='twitter:image']",
                "meta[name='twitter:image:src']",
            ],
        ),
        og_image: meta_content(
            &document,
            &["meta[property='og:image']", "meta[name='og:image']"],
        ),
    }
}

fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let content = document
            .select(&selector)
            .filter_map(|element| element.value().attr("content"))
            .find(|content| !content.is_empty());
        if let Some(content) = content {
            return Some(content.to_string());
        }
    }
    None
}
