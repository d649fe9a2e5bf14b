//! Markup normalisation before structural parsing
//!
//! Some annotations are embedded as loose inline text rather than elements
//! (`aka <em>"Name"</em>`). Substitution rules rewrite them into a synthetic
//! `<div class="...">payload</div>` wrapper that path expressions can address.

use std::borrow::Cow;

use regex::Regex;
use tracing::debug;

use crate::error::RuleError;
use crate::resolution::PrefixMarker;

/// Class carried by the synthetic alias wrapper
pub const ALIAS_CLASS: &str = "_spAKA";

/// Suffix appended to every wrapped alias payload; separates the name from
/// notes the source may attach
pub const ALIAS_NOTES_SEPARATOR: &str = "::";

/// The payload ends at the first `"` followed by a closing tag, so quotes
/// inside an alias are kept. The leading `aka `/`birth name ` is consumed,
/// which leaves nothing for a second pass to match.
const ALIAS_PATTERN: &str =
    r#"(?i)(?:aka|birth name) (?P<open><em>")(?P<payload>[^<\n]*?)"(?P<close><br>|<br/>|</em>|</td>)"#;

const REQUIRED_GROUPS: [&str; 3] = ["open", "payload", "close"];

#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    pattern: Regex,
    replacement: String,
}

impl SubstitutionRule {
    /// Raw regex rule; `replacement` uses `${name}` group references.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, RuleError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Rule wrapping the `payload` group in a `<div class="{class}">`, keeping
    /// the `open` and `close` markers around it.
    pub fn wrap(pattern: &str, class: &str, suffix: &str) -> Result<Self, RuleError> {
        let regex = Regex::new(pattern)?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if let Some(missing) = REQUIRED_GROUPS.iter().find(|g| !names.contains(*g)) {
            return Err(RuleError::MissingGroup(missing.to_string()));
        }

        Ok(Self {
            pattern: regex,
            replacement: format!(r#"${{open}}<div class="{class}">${{payload}}{suffix}</div>${{close}}"#),
        })
    }

    /// `aka <em>"Name"</em>` annotations on person listings
    pub fn alias() -> Result<Self, RuleError> {
        Self::wrap(ALIAS_PATTERN, ALIAS_CLASS, ALIAS_NOTES_SEPARATOR)
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

/// Ordered substitution pass, optionally gated on a marker in the document
/// head. Once the gate passes the rules apply to the whole document.
#[derive(Debug, Clone, Default)]
pub struct DocumentPreprocessor {
    gate: Option<PrefixMarker>,
    rules: Vec<SubstitutionRule>,
}

impl DocumentPreprocessor {
    pub fn new(rules: Vec<SubstitutionRule>) -> Self {
        Self { gate: None, rules }
    }

    pub fn gated(gate: PrefixMarker, rules: Vec<SubstitutionRule>) -> Self {
        Self {
            gate: Some(gate),
            rules,
        }
    }

    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }

    /// Borrowed when nothing was rewritten.
    pub fn preprocess<'t>(&self, raw: &'t str) -> Cow<'t, str> {
        let mut text = Cow::Borrowed(raw);

        if let Some(gate) = &self.gate {
            if !gate.is_present(raw) {
                return text;
            }
        }

        for (i, rule) in self.rules.iter().enumerate() {
            let replaced = match rule.apply(&text) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                debug!(rule = i, "substitution applied");
                text = Cow::Owned(s);
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><head><title>IMDb Name Search</title></head><body><table>
<tr><td>1.</td><td></td><td><a href="/name/nm0000154/">Mel Gibson</a> (I)<br><small>aka <em>"Mel Columcille Gerard Gibson"</em></small></td></tr>
<tr><td>2.</td><td></td><td><a href="/name/nm0326040/">Mel Gibson</a> (II)<br><small>birth name <em>"Melvin Gibson"<br>Aka <em>"Mel G."</td></tr>
</table></body></html>"#;

    fn preprocessor() -> DocumentPreprocessor {
        DocumentPreprocessor::gated(
            PrefixMarker::new("<title>imdb name"),
            vec![SubstitutionRule::alias().unwrap()],
        )
    }

    #[test]
    fn test_alias_wrapped() {
        let out = preprocessor().preprocess(LISTING);
        assert!(out.contains(r#"<small><em>"<div class="_spAKA">Mel Columcille Gerard Gibson::</div></em>"#));
        assert!(out.contains(r#"(II)<br><small><em>"<div class="_spAKA">Melvin Gibson::</div><br>"#));
        assert!(out.contains(r#"<br><em>"<div class="_spAKA">Mel G.::</div></td>"#));
        assert!(!out.to_lowercase().contains("aka <em>"));
    }

    #[test]
    fn test_alias_with_inner_quotes() {
        let html = r#"<html><head><title>IMDb Name Search</title></head><body>
<td><a href="/name/nm0425005/">Dwayne Johnson</a><br>aka <em>"Dwayne "The Rock" Johnson"</em></td>
</body></html>"#;
        let out = preprocessor().preprocess(html);
        assert!(out.contains(r#"<div class="_spAKA">Dwayne "The Rock" Johnson::</div></em>"#));
        assert_eq!(preprocessor().preprocess(&out), out);
    }

    #[test]
    fn test_alias_does_not_span_lines() {
        let html = "<html><head><title>IMDb Name Search</title></head><body>aka <em>\"Split\nName\"</em></body></html>";
        assert!(matches!(preprocessor().preprocess(html), Cow::Borrowed(_)));
    }

    #[test]
    fn test_idempotent() {
        let p = preprocessor();
        let once = p.preprocess(LISTING).into_owned();
        let twice = p.preprocess(&once);
        assert_eq!(once, twice);
        assert!(matches!(twice, Cow::Borrowed(_)));
    }

    #[test]
    fn test_no_match_is_borrowed_passthrough() {
        let html = "<html><head><title>IMDb Name Search</title></head><body>nothing</body></html>";
        assert!(matches!(preprocessor().preprocess(html), Cow::Borrowed(s) if s == html));
    }

    #[test]
    fn test_gate_skips_direct_hit_pages() {
        let html = LISTING.replace("IMDb Name Search", "Mel Gibson");
        assert!(matches!(preprocessor().preprocess(&html), Cow::Borrowed(_)));
    }

    #[test]
    fn test_gate_only_checks_prefix_but_rewrites_whole_document() {
        let padding = "x".repeat(4096);
        let late_marker = format!("<html><body>{padding}<title>IMDb Name Search</title>aka <em>\"A\"</em></body></html>");
        assert!(matches!(preprocessor().preprocess(&late_marker), Cow::Borrowed(_)));

        let late_alias = format!("<html><head><title>IMDb Name Search</title></head><body>{padding} aka <em>\"A\"</em></body></html>");
        assert!(preprocessor().preprocess(&late_alias).contains(r#"<div class="_spAKA">A::</div>"#));
    }

    #[test]
    fn test_wrap_requires_named_groups() {
        let err = SubstitutionRule::wrap(r"(?P<open>a)(?P<payload>b)", "x", "").unwrap_err();
        assert!(matches!(err, RuleError::MissingGroup(g) if g == "close"));
        assert!(matches!(
            SubstitutionRule::new("(", ""),
            Err(RuleError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_ungated_rules_apply_in_order() {
        let p = DocumentPreprocessor::new(vec![
            SubstitutionRule::new("a", "b").unwrap(),
            SubstitutionRule::new("b", "c").unwrap(),
        ]);
        assert_eq!(p.preprocess("aab"), "ccc");
    }
}
