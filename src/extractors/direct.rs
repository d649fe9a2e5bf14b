//! Direct-hit extraction
//!
//! When a search matches exactly one entity the source answers with that
//! entity's detail page. The page has no structured "you are viewing X"
//! field, so the identifier comes from the entity's discussion-board link and
//! the display name from the text accumulated inside title elements before it.
//!
//! The scan is a single pass in document order driven by [`ScanState`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::debug;

use super::ExtractedRecord;
use crate::names::{IdentifierNormalizer, NameFormatter};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Decides whether accumulated title text is site chrome rather than a name
pub type ChromePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Chrome when every token occurs in the text
pub fn all_tokens<I, S>(tokens: I) -> ChromePredicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
    Arc::new(move |text: &str| !tokens.is_empty() && tokens.iter().all(|t| text.contains(t.as_str())))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectHit {
    pub identifier: String,
    pub name: String,
}

/// Scan state. Text only accumulates inside title elements; anchors decide
/// whether the accumulated text becomes a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Accumulating {
        name: String,
        kept: Option<DirectHit>,
    },
    Matched(DirectHit),
}

impl ScanState {
    fn kept(self) -> Option<DirectHit> {
        match self {
            ScanState::Idle => None,
            ScanState::Accumulating { kept, .. } => kept,
            ScanState::Matched(hit) => Some(hit),
        }
    }

    pub fn on_text(self, text: &str) -> Self {
        match self {
            ScanState::Idle => ScanState::Accumulating {
                name: text.to_string(),
                kept: None,
            },
            ScanState::Accumulating { mut name, kept } => {
                name.push_str(text);
                ScanState::Accumulating { name, kept }
            }
            ScanState::Matched(hit) => ScanState::Accumulating {
                name: text.to_string(),
                kept: Some(hit),
            },
        }
    }

    /// A structurally valid anchor carrying `identifier` was reached.
    pub fn on_anchor(self, identifier: String, is_chrome: &dyn Fn(&str) -> bool) -> Self {
        let (name, kept) = match self {
            ScanState::Accumulating { name, kept } => (name, kept),
            other => return other,
        };

        let name = name.trim();
        if name.is_empty() {
            return ScanState::Accumulating {
                name: String::new(),
                kept,
            };
        }

        if is_chrome(name) {
            debug!(name, "title text looks like chrome, resetting");
            return kept.map_or(ScanState::Idle, ScanState::Matched);
        }

        ScanState::Matched(DirectHit {
            identifier,
            name: name.to_string(),
        })
    }

    pub fn finish(self) -> Option<DirectHit> {
        self.kept()
    }
}

/// Locates the single entity on a detail page
#[derive(Clone)]
pub struct DirectHitExtractor {
    link_prefix: String,
    link_marker: String,
    title_tag: String,
    canonical: bool,
    is_chrome: ChromePredicate,
    normalizer: Arc<dyn IdentifierNormalizer>,
    formatter: Arc<dyn NameFormatter>,
}

impl DirectHitExtractor {
    /// `link_prefix` and `link_marker` are matched against the lower-cased
    /// href: it must start with the prefix and contain the marker.
    pub fn new(
        link_prefix: impl Into<String>,
        link_marker: impl Into<String>,
        normalizer: Arc<dyn IdentifierNormalizer>,
        formatter: Arc<dyn NameFormatter>,
    ) -> Self {
        Self {
            link_prefix: link_prefix.into().to_lowercase(),
            link_marker: link_marker.into().to_lowercase(),
            title_tag: "title".to_string(),
            canonical: true,
            is_chrome: Arc::new(|_: &str| false),
            normalizer,
            formatter,
        }
    }

    pub fn with_chrome(mut self, is_chrome: ChromePredicate) -> Self {
        self.is_chrome = is_chrome;
        self
    }

    pub fn with_title_tag(mut self, tag: impl Into<String>) -> Self {
        self.title_tag = tag.into().to_lowercase();
        self
    }

    pub fn canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Scan the whole document; the last valid hit wins.
    pub fn scan(&self, document: &Html) -> Option<DirectHit> {
        let mut state = ScanState::Idle;

        for node in document.root_element().descendants() {
            if let Some(text) = node.value().as_text() {
                let in_title = node
                    .ancestors()
                    .filter_map(|n| n.value().as_element())
                    .any(|el| el.name() == self.title_tag && &*el.name.ns == HTML_NAMESPACE);
                if in_title {
                    state = state.on_text(text);
                }
                continue;
            }

            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };
            if let Some(identifier) = self.anchor_identifier(element) {
                state = state.on_anchor(identifier, self.is_chrome.as_ref());
            }
        }

        state.finish()
    }

    /// The hit as a record with a structured `name` field and a `title`
    /// rebuilt from it in canonical form (`Gibson, Mel (I)`).
    pub fn extract_direct(&self, document: &Html) -> Option<ExtractedRecord> {
        let hit = self.scan(document)?;
        let name = self.formatter.parse_display_name(&hit.name, self.canonical);
        let title = self.formatter.format_display_name(&name, true);

        let mut fields = BTreeMap::new();
        fields.insert(
            "name".to_string(),
            serde_json::to_value(name).unwrap_or(Value::Null),
        );
        fields.insert("title".to_string(), Value::String(title));
        Some(ExtractedRecord::new(hit.identifier, fields))
    }

    fn anchor_identifier(&self, element: ElementRef<'_>) -> Option<String> {
        if element.value().name() != "a" {
            return None;
        }
        let href = element.value().attr("href")?.to_lowercase();
        if !href.starts_with(&self.link_prefix) || !href.contains(&self.link_marker) {
            return None;
        }
        self.normalizer.normalize(&href)
    }
}

impl fmt::Debug for DirectHitExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectHitExtractor")
            .field("link_prefix", &self.link_prefix)
            .field("link_marker", &self.link_marker)
            .field("title_tag", &self.title_tag)
            .field("canonical", &self.canonical)
            .finish_non_exhaustive()
    }
}
