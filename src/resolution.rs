//! Direct-hit vs. listing resolution
//!
//! The source skips the listing and answers with the detail page whenever a
//! search matches exactly one entity. A marker in the head of the document
//! tells the two shapes apart, so the choice is made once, before parsing,
//! without building the tree twice.
//!
//! ```text
//! raw -> preprocess -> parse -> classify -> DirectHit -> extract_direct
//!                                        -> Listing   -> extract_all
//! ```

use scraper::Html;
use serde::Serialize;
use tracing::debug;

use crate::error::{ParseError, Result};
use crate::extractors::{DirectHitExtractor, ExtractedRecord, ExtractionSpec};
use crate::preprocess::DocumentPreprocessor;

/// Characters of the document inspected for markers
pub const MARKER_WINDOW: usize = 1024;

/// Case-insensitive marker looked up in a bounded prefix of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMarker {
    marker: String,
    window: usize,
}

impl PrefixMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().to_lowercase(),
            window: MARKER_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn is_present(&self, raw: &str) -> bool {
        let end = raw
            .char_indices()
            .nth(self.window)
            .map_or(raw.len(), |(i, _)| i);
        raw[..end].to_lowercase().contains(&self.marker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionDecision {
    DirectHit,
    Listing,
}

/// Classifies a document by the presence of the listing marker
#[derive(Debug, Clone)]
pub struct ResolutionController {
    listing_marker: PrefixMarker,
}

impl ResolutionController {
    pub fn new(listing_marker: PrefixMarker) -> Self {
        Self { listing_marker }
    }

    pub fn listing_marker(&self) -> &PrefixMarker {
        &self.listing_marker
    }

    pub fn classify(&self, raw: &str) -> ResolutionDecision {
        if self.listing_marker.is_present(raw) {
            ResolutionDecision::Listing
        } else {
            ResolutionDecision::DirectHit
        }
    }
}

/// Full pipeline for one kind of search page
#[derive(Debug, Clone)]
pub struct SearchParser {
    controller: ResolutionController,
    preprocessor: DocumentPreprocessor,
    listing: ExtractionSpec,
    direct: DirectHitExtractor,
}

impl SearchParser {
    pub fn new(
        controller: ResolutionController,
        preprocessor: DocumentPreprocessor,
        listing: ExtractionSpec,
        direct: DirectHitExtractor,
    ) -> Self {
        Self {
            controller,
            preprocessor,
            listing,
            direct,
        }
    }

    pub fn controller(&self) -> &ResolutionController {
        &self.controller
    }

    pub fn listing_spec(&self) -> &ExtractionSpec {
        &self.listing
    }

    /// Records in document order; zero or one for a direct hit. An empty
    /// document has no listing marker and yields no records.
    pub fn parse(&self, raw: &str) -> Result<Vec<ExtractedRecord>> {
        let text = self.preprocessor.preprocess(raw);
        let document = Html::parse_document(&text);
        let decision = self.controller.classify(raw);
        debug!(spec = %self.listing.label(), ?decision, "resolved document shape");

        let records = match decision {
            ResolutionDecision::Listing => self.listing.extract_all(&document),
            ResolutionDecision::DirectHit => {
                self.direct.extract_direct(&document).into_iter().collect()
            }
        };
        debug!(spec = %self.listing.label(), records = records.len(), "extraction finished");
        Ok(records)
    }

    pub fn parse_bytes(&self, raw: &[u8]) -> Result<Vec<ExtractedRecord>> {
        let text = std::str::from_utf8(raw).map_err(|e| ParseError::InvalidUtf8(e.valid_up_to()))?;
        self.parse(text)
    }
}
