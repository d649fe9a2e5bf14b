//! Name and identifier collaborators
//!
//! The extraction engine treats both as opaque pure functions. The default
//! implementations here cover the person pages handled by the built-in
//! parsers; callers can plug in their own through the traits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RuleError;

/// Structured form of a display name such as `Mel Gibson (I)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName {
    pub name: String,
    /// Disambiguation qualifier without parentheses, e.g. `I`, `II`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

pub trait NameFormatter: Send + Sync {
    fn parse_display_name(&self, text: &str, canonical: bool) -> DisplayName;

    fn format_display_name(&self, name: &DisplayName, canonical: bool) -> String;
}

pub trait IdentifierNormalizer: Send + Sync {
    /// Canonical identifier encoded by a link or raw id, if any
    fn normalize(&self, raw: &str) -> Option<String>;
}

impl<F> IdentifierNormalizer for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn normalize(&self, raw: &str) -> Option<String> {
        self(raw)
    }
}

/// Splits a trailing roman-numeral qualifier and moves the surname first in
/// canonical form (`Gibson, Mel`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicNameFormatter;

impl NameFormatter for BasicNameFormatter {
    fn parse_display_name(&self, text: &str, canonical: bool) -> DisplayName {
        let text = collapse_whitespace(text);
        let (name, qualifier) = split_qualifier(&text);
        let name = if canonical {
            canonical_name(name)
        } else {
            name.to_string()
        };
        DisplayName { name, qualifier }
    }

    fn format_display_name(&self, name: &DisplayName, canonical: bool) -> String {
        let base = if canonical {
            canonical_name(&name.name)
        } else {
            normal_name(&name.name)
        };
        match &name.qualifier {
            Some(q) => format!("{base} ({q})"),
            None => base,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_qualifier(text: &str) -> (&str, Option<String>) {
    let Some(open) = text.rfind(" (") else {
        return (text, None);
    };
    let Some(inner) = text[open + 2..].strip_suffix(')') else {
        return (text, None);
    };
    if !inner.is_empty() && inner.chars().all(|c| "IVXLCDM".contains(c)) {
        (text[..open].trim_end(), Some(inner.to_string()))
    } else {
        (text, None)
    }
}

fn canonical_name(name: &str) -> String {
    if name.contains(", ") {
        return name.to_string();
    }
    match name.rsplit_once(' ') {
        Some((first, last)) => format!("{last}, {first}"),
        None => name.to_string(),
    }
}

fn normal_name(name: &str) -> String {
    match name.split_once(", ") {
        Some((last, first)) if !first.contains(", ") => format!("{first} {last}"),
        _ => name.to_string(),
    }
}

/// Extracts the digits following `prefix` (e.g. `nm0000154` -> `0000154`)
/// from a link, resolving relative links against a base URL first.
#[derive(Debug, Clone)]
pub struct PrefixedIdNormalizer {
    base: Url,
    pattern: Regex,
}

impl PrefixedIdNormalizer {
    pub fn new(base: &str, prefix: &str) -> Result<Self, RuleError> {
        let base = Url::parse(base)?;
        let pattern = Regex::new(&format!(r"(?i){}([0-9]{{7,}})\b", regex::escape(prefix)))?;
        Ok(Self { base, pattern })
    }

    pub fn person() -> Result<Self, RuleError> {
        Self::new("https://www.imdb.com/", "nm")
    }
}

impl IdentifierNormalizer for PrefixedIdNormalizer {
    fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let path = match self.base.join(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => raw.to_string(),
        };
        self.pattern
            .captures_iter(&path)
            .last()
            .map(|caps| caps[1].to_string())
    }
}
