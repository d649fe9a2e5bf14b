//! Declarative spec definitions
//!
//! Specs can be written as JSON and compiled against a [`TransformRegistry`]
//! that resolves transform names to postprocess functions:
//!
//! ```json
//! {
//!   "label": "search",
//!   "root": "td:nth-of-type(3) > a[href^=\"/name/nm\"] ^",
//!   "identifier": "id",
//!   "attributes": [
//!     {"key": "id", "path": "> a@href", "transform": "identifier"},
//!     {"key": "name", "path": {"name": "> a@text", "index": "@owntext"}, "transform": "name"},
//!     {"key": "akas", "path": "div._spAKA@text", "multi": true, "transform": "aliases"}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::extractors::{AttributeRule, ExtractionSpec, PathExpression, Postprocess, RawValue};
use crate::names::{IdentifierNormalizer, NameFormatter};
use crate::preprocess::ALIAS_NOTES_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathDefinition {
    Single(String),
    Mapping(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub key: String,
    pub path: PathDefinition,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub transform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDefinition {
    pub label: String,
    pub root: String,
    pub identifier: String,
    pub attributes: Vec<AttributeDefinition>,
}

impl SpecDefinition {
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn compile(&self, transforms: &TransformRegistry) -> Result<ExtractionSpec, RuleError> {
        let root = PathExpression::parse(&self.root)?;
        let attributes = self
            .attributes
            .iter()
            .map(|attr| attr.compile(transforms))
            .collect::<Result<Vec<_>, _>>()?;

        ExtractionSpec::new(self.label.clone(), root, self.identifier.clone(), attributes)
    }
}

impl AttributeDefinition {
    fn compile(&self, transforms: &TransformRegistry) -> Result<AttributeRule, RuleError> {
        let postprocess = match &self.transform {
            Some(name) => Some(
                transforms
                    .get(name)
                    .ok_or_else(|| RuleError::UnknownTransform(name.clone()))?,
            ),
            None => None,
        };

        let rule = match (&self.path, postprocess) {
            (PathDefinition::Single(path), postprocess) => {
                let rule = AttributeRule::single(self.key.clone(), PathExpression::parse(path)?);
                match postprocess {
                    Some(f) => rule.with_postprocess_arc(f),
                    None => rule,
                }
            }
            (PathDefinition::Mapping(_), None) => {
                return Err(RuleError::MissingPostprocess(self.key.clone()));
            }
            (PathDefinition::Mapping(paths), Some(f)) => {
                let paths = paths
                    .iter()
                    .map(|(key, path)| Ok((key.clone(), PathExpression::parse(path)?)))
                    .collect::<Result<Vec<_>, RuleError>>()?;
                AttributeRule::mapping_with(self.key.clone(), paths, f)
            }
        };

        Ok(if self.multi { rule.multi() } else { rule })
    }
}

/// Named postprocess transforms, built once and passed to whoever compiles specs
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Postprocess>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `trim`, `join`, `aliases`, plus `identifier` and `name` backed by the
    /// given collaborators.
    pub fn with_defaults(
        normalizer: Arc<dyn IdentifierNormalizer>,
        formatter: Arc<dyn NameFormatter>,
        canonical: bool,
    ) -> Self {
        let mut registry = Self::new();
        registry.register("trim", trim);
        registry.register("join", join);
        registry.register("aliases", aliases);
        registry.register("identifier", move |raw: RawValue| {
            raw.first()
                .and_then(|link| normalizer.normalize(link))
                .map_or(Value::Null, Value::String)
        });
        registry.register("name", move |raw: RawValue| {
            let text = match &raw {
                RawValue::Mapping(m) => match m.first("name") {
                    Some(name) => format!("{name} {}", m.first("index").unwrap_or_default()),
                    None => return Value::Null,
                },
                other => match other.first() {
                    Some(name) => name.to_string(),
                    None => return Value::Null,
                },
            };
            serde_json::to_value(formatter.parse_display_name(&text, canonical)).unwrap_or(Value::Null)
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(RawValue) -> Value + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(transform));
    }

    pub fn get(&self, name: &str) -> Option<Postprocess> {
        self.transforms.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.transforms.keys()).finish()
    }
}

fn trim(raw: RawValue) -> Value {
    match raw {
        RawValue::Multi(values) => Value::Array(
            values
                .iter()
                .map(|v| Value::String(v.trim().to_string()))
                .collect(),
        ),
        other => other
            .first()
            .map_or(Value::Null, |v| Value::String(v.trim().to_string())),
    }
}

fn join(raw: RawValue) -> Value {
    let parts: Vec<String> = raw
        .into_strings()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        Value::Null
    } else {
        Value::String(parts.join(" "))
    }
}

fn aliases(raw: RawValue) -> Value {
    Value::Array(
        raw.into_strings()
            .iter()
            .map(|alias| {
                let alias = alias.trim();
                alias.strip_suffix(ALIAS_NOTES_SEPARATOR).unwrap_or(alias).trim()
            })
            .filter(|alias| !alias.is_empty())
            .map(|alias| Value::String(alias.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{BasicNameFormatter, PrefixedIdNormalizer};
    use scraper::Html;
    use serde_json::json;

    fn transforms() -> TransformRegistry {
        TransformRegistry::with_defaults(
            Arc::new(PrefixedIdNormalizer::person().unwrap()),
            Arc::new(BasicNameFormatter),
            true,
        )
    }

    const SPEC: &str = r#"{
        "label": "people",
        "root": "li.person",
        "identifier": "id",
        "attributes": [
            {"key": "id", "path": "a@href", "transform": "identifier"},
            {"key": "name", "path": {"name": "a@text", "index": "span.idx@text"}, "transform": "name"},
            {"key": "akas", "path": "i.aka@text", "multi": true, "transform": "aliases"},
            {"key": "role", "path": "em@text", "transform": "trim"},
            {"key": "raw", "path": "b@text"}
        ]
    }"#;

    #[test]
    fn test_compile_and_extract() {
        let spec = SpecDefinition::from_json(SPEC).unwrap().compile(&transforms()).unwrap();
        let doc = Html::parse_document(
            r#"<ul>
                <li class="person"><a href="/name/nm0000154/">Mel Gibson</a> <span class="idx">(I)</span>
                    <i class="aka">Mad Mel::</i><i class="aka">  </i><i class="aka">Max</i><em> actor </em></li>
                <li class="person"><a href="/list/ls001/">Not a person</a></li>
                <li class="person"><a href="/name/nm0000155/">Cher</a></li>
            </ul>"#,
        );

        let records = spec.extract_all(&doc);
        assert_eq!(records.len(), 2);

        let mel = &records[0];
        assert_eq!(mel.identifier(), "0000154");
        assert_eq!(mel.field("name"), Some(&json!({"name": "Gibson, Mel", "qualifier": "I"})));
        assert_eq!(mel.field("akas"), Some(&json!(["Mad Mel", "Max"])));
        assert_eq!(mel.field("role"), Some(&json!("actor")));
        assert_eq!(mel.field("raw"), Some(&Value::Null));

        let cher = &records[1];
        assert_eq!(cher.identifier(), "0000155");
        assert_eq!(cher.field("name"), Some(&json!({"name": "Cher"})));
        assert_eq!(cher.field("akas"), Some(&json!([])));
    }

    #[test]
    fn test_mapping_without_transform_rejected() {
        let json = r#"{
            "label": "bad", "root": "li", "identifier": "id",
            "attributes": [
                {"key": "id", "path": "a@href"},
                {"key": "name", "path": {"name": "a@text"}}
            ]
        }"#;
        let err = SpecDefinition::from_json(json).unwrap().compile(&transforms()).unwrap_err();
        assert!(matches!(err, RuleError::MissingPostprocess(key) if key == "name"));
    }

    #[test]
    fn test_unknown_transform_and_bad_path() {
        let mut def = SpecDefinition::from_json(SPEC).unwrap();
        def.attributes[3].transform = Some("shout".to_string());
        assert!(matches!(
            def.compile(&transforms()),
            Err(RuleError::UnknownTransform(name)) if name == "shout"
        ));

        let mut def = SpecDefinition::from_json(SPEC).unwrap();
        def.root = "li[".to_string();
        assert!(matches!(def.compile(&transforms()), Err(RuleError::Path(_))));

        assert!(matches!(
            SpecDefinition::from_json("{\"label\": 1}"),
            Err(RuleError::Definition(_))
        ));
    }

    #[test]
    fn test_custom_transform() {
        let mut registry = TransformRegistry::new();
        registry.register("upper", |raw: RawValue| {
            raw.first().map_or(Value::Null, |s| json!(s.to_uppercase()))
        });
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["upper"]);

        let f = registry.get("upper").unwrap();
        assert_eq!(f(RawValue::Single(Some("abc".to_string()))), json!("ABC"));
        assert!(registry.get("trim").is_none());
    }

    #[test]
    fn test_builtin_helpers() {
        assert_eq!(join(RawValue::Multi(vec![" a ".into(), "".into(), "b".into()])), json!("a b"));
        assert_eq!(join(RawValue::Single(None)), Value::Null);
        assert_eq!(trim(RawValue::Single(Some("  x ".into()))), json!("x"));
        assert_eq!(aliases(RawValue::Multi(vec!["A::".into(), "::".into()])), json!(["A"]));
    }
}
