//! Extraction specs for repeated records

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::{debug, trace};

use super::path::PathExpression;
use super::rule::AttributeRule;
use super::ExtractedRecord;
use crate::error::RuleError;

/// A root path selecting one node per record, and the rules evaluated
/// relative to each of those nodes.
#[derive(Debug, Clone)]
pub struct ExtractionSpec {
    label: String,
    root: PathExpression,
    identifier: String,
    attributes: Vec<AttributeRule>,
}

impl ExtractionSpec {
    /// `identifier` names the attribute whose value becomes the record id;
    /// rows where it is missing or empty are dropped.
    pub fn new(
        label: impl Into<String>,
        root: PathExpression,
        identifier: impl Into<String>,
        attributes: Vec<AttributeRule>,
    ) -> Result<Self, RuleError> {
        let identifier = identifier.into();
        if !attributes.iter().any(|rule| rule.key() == identifier) {
            return Err(RuleError::UnknownIdentifier(identifier));
        }

        Ok(Self {
            label: label.into(),
            root,
            identifier,
            attributes,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> &PathExpression {
        &self.root
    }

    pub fn identifier_key(&self) -> &str {
        &self.identifier
    }

    pub fn attributes(&self) -> &[AttributeRule] {
        &self.attributes
    }

    /// One record per root node, in document order.
    pub fn extract_all(&self, document: &Html) -> Vec<ExtractedRecord> {
        self.extract_from(document.root_element())
    }

    pub fn extract_from(&self, context: ElementRef<'_>) -> Vec<ExtractedRecord> {
        let roots = self.root.select(context);
        trace!(spec = %self.label, roots = roots.len(), "evaluating root nodes");

        let mut records = Vec::with_capacity(roots.len());
        for (row, node) in roots.into_iter().enumerate() {
            match self.extract_one(node) {
                Some(record) => records.push(record),
                None => debug!(spec = %self.label, row, "dropping row without identifier"),
            }
        }
        records
    }

    fn extract_one(&self, node: ElementRef<'_>) -> Option<ExtractedRecord> {
        let mut fields: BTreeMap<String, Value> = self
            .attributes
            .iter()
            .map(|rule| (rule.key().to_string(), rule.evaluate(node)))
            .collect();

        match fields.remove(&self.identifier)? {
            Value::String(id) if !id.trim().is_empty() => {
                Some(ExtractedRecord::new(id.trim().to_string(), fields))
            }
            _ => None,
        }
    }
}
