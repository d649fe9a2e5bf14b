//! Parser registry
//!
//! Maps parser names to configured [`SearchParser`]s. Built explicitly at
//! startup and passed by reference; there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{SpecDefinition, TransformRegistry};
use crate::error::RuleError;
use crate::extractors::{all_tokens, DirectHitExtractor};
use crate::names::{BasicNameFormatter, IdentifierNormalizer, NameFormatter, PrefixedIdNormalizer};
use crate::preprocess::{DocumentPreprocessor, SubstitutionRule};
use crate::resolution::{PrefixMarker, ResolutionController, SearchParser};

pub const PERSON_SEARCH_PARSER: &str = "search_person_parser";

/// Title of the person listing page
const PERSON_LISTING_MARKER: &str = "<title>imdb name";

const PERSON_SEARCH_SPEC: &str = r#"{
    "label": "search",
    "root": "td:nth-of-type(3) > a[href^=\"/name/nm\"] ^",
    "identifier": "id",
    "attributes": [
        {"key": "id", "path": "> a@href", "transform": "identifier"},
        {"key": "name", "path": {"name": "> a@text", "index": "@owntext"}, "transform": "name"},
        {"key": "akas", "path": "div._spAKA@text", "multi": true, "transform": "aliases"}
    ]
}"#;

#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, SearchParser>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in parsers
    pub fn with_defaults() -> Result<Self, RuleError> {
        let mut registry = Self::new();
        registry.register(PERSON_SEARCH_PARSER, person_search_parser()?);
        Ok(registry)
    }

    /// Returns the parser previously registered under `name`, if any.
    pub fn register(&mut self, name: impl Into<String>, parser: SearchParser) -> Option<SearchParser> {
        self.parsers.insert(name.into(), parser)
    }

    pub fn get(&self, name: &str) -> Option<&SearchParser> {
        self.parsers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}

/// Person search: listing rows with aliases, or the person page on a direct hit
pub fn person_search_parser() -> Result<SearchParser, RuleError> {
    let normalizer: Arc<dyn IdentifierNormalizer> = Arc::new(PrefixedIdNormalizer::person()?);
    let formatter: Arc<dyn NameFormatter> = Arc::new(BasicNameFormatter);
    let marker = PrefixMarker::new(PERSON_LISTING_MARKER);

    let transforms = TransformRegistry::with_defaults(Arc::clone(&normalizer), Arc::clone(&formatter), true);
    let listing = SpecDefinition::from_json(PERSON_SEARCH_SPEC)?.compile(&transforms)?;

    let direct = DirectHitExtractor::new("/name/nm", "/board", normalizer, formatter)
        .with_chrome(all_tokens(["IMDb Name", "Search"]));

    Ok(SearchParser::new(
        ResolutionController::new(marker.clone()),
        DocumentPreprocessor::gated(marker, vec![SubstitutionRule::alias()?]),
        listing,
        direct,
    ))
}
