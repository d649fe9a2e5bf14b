//! Attribute rules
//!
//! An [`AttributeRule`] binds a key to one path or to a set of named sub-paths,
//! plus an optional postprocess transform turning the raw strings into the
//! final [`Value`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use scraper::ElementRef;
use serde_json::Value;

use super::path::PathExpression;

/// Pure transform from raw extracted strings to an attribute value
pub type Postprocess = Arc<dyn Fn(RawValue) -> Value + Send + Sync>;

/// Raw values handed to a postprocess transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Single-path rule; `None` when the path found nothing
    Single(Option<String>),
    /// Multi rule: every match in document order
    Multi(Vec<String>),
    /// Mapping rule: one entry per declared sub-key
    Mapping(RawMapping),
}

impl RawValue {
    /// First raw string, whatever the shape.
    pub fn first(&self) -> Option<&str> {
        match self {
            RawValue::Single(value) => value.as_deref(),
            RawValue::Multi(values) => values.first().map(String::as_str),
            RawValue::Mapping(_) => None,
        }
    }

    pub fn into_strings(self) -> Vec<String> {
        match self {
            RawValue::Single(value) => value.into_iter().collect(),
            RawValue::Multi(values) => values,
            RawValue::Mapping(mapping) => mapping.0.into_values().flatten().collect(),
        }
    }
}

/// Sub-key to raw matches. Sub-paths that found nothing map to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMapping(BTreeMap<String, Vec<String>>);

impl RawMapping {
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.first().map(String::as_str)
    }

    pub fn all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Where a rule reads from
#[derive(Debug, Clone)]
pub enum RulePath {
    Single(PathExpression),
    Mapping(Vec<(String, PathExpression)>),
}

#[derive(Clone)]
pub struct AttributeRule {
    key: String,
    path: RulePath,
    multi: bool,
    postprocess: Option<Postprocess>,
}

impl AttributeRule {
    /// Single-path rule returning the raw value unchanged
    pub fn single(key: impl Into<String>, path: PathExpression) -> Self {
        Self {
            key: key.into(),
            path: RulePath::Single(path),
            multi: false,
            postprocess: None,
        }
    }

    /// Mapping rule; combining the sub-values requires a postprocess
    pub fn mapping<K, F>(
        key: impl Into<String>,
        paths: impl IntoIterator<Item = (K, PathExpression)>,
        postprocess: F,
    ) -> Self
    where
        K: Into<String>,
        F: Fn(RawValue) -> Value + Send + Sync + 'static,
    {
        Self::mapping_with(
            key,
            paths,
            Arc::new(postprocess),
        )
    }

    pub(crate) fn mapping_with<K>(
        key: impl Into<String>,
        paths: impl IntoIterator<Item = (K, PathExpression)>,
        postprocess: Postprocess,
    ) -> Self
    where
        K: Into<String>,
    {
        Self {
            key: key.into(),
            path: RulePath::Mapping(paths.into_iter().map(|(k, p)| (k.into(), p)).collect()),
            multi: false,
            postprocess: Some(postprocess),
        }
    }

    /// Collect every match instead of the first one
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn with_postprocess<F>(self, postprocess: F) -> Self
    where
        F: Fn(RawValue) -> Value + Send + Sync + 'static,
    {
        self.with_postprocess_arc(Arc::new(postprocess))
    }

    pub(crate) fn with_postprocess_arc(mut self, postprocess: Postprocess) -> Self {
        self.postprocess = Some(postprocess);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &RulePath {
        &self.path
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Raw values for this rule, relative to `context`.
    pub fn raw(&self, context: ElementRef<'_>) -> RawValue {
        match &self.path {
            RulePath::Single(path) if self.multi => RawValue::Multi(path.all_values(context)),
            RulePath::Single(path) if path.is_multi() => RawValue::Multi(path.values(context)),
            RulePath::Single(path) => RawValue::Single(path.first_value(context)),
            RulePath::Mapping(paths) => {
                let mut mapping = RawMapping::default();
                for (key, path) in paths {
                    let values = if self.multi {
                        path.all_values(context)
                    } else {
                        path.values(context)
                    };
                    mapping.insert(key.clone(), values);
                }
                RawValue::Mapping(mapping)
            }
        }
    }

    /// Final attribute value. Missing matches never fail.
    pub fn evaluate(&self, context: ElementRef<'_>) -> Value {
        let raw = self.raw(context);
        match &self.postprocess {
            Some(postprocess) => postprocess(raw),
            None => raw_to_value(raw),
        }
    }
}

impl fmt::Debug for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRule")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("multi", &self.multi)
            .field("postprocess", &self.postprocess.is_some())
            .finish()
    }
}

fn raw_to_value(raw: RawValue) -> Value {
    match raw {
        RawValue::Single(value) => value.map(Value::String).unwrap_or(Value::Null),
        RawValue::Multi(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        // unreachable through the public constructors, kept total
        RawValue::Mapping(mapping) => Value::Object(
            mapping
                .0
                .into_iter()
                .map(|(k, v)| (k, Value::Array(v.into_iter().map(Value::String).collect())))
                .collect(),
        ),
    }
}
