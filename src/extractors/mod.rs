//! Record extraction
//!
//! - `path` - path expressions over the parsed tree
//! - `rule` - attribute rules and postprocess transforms
//! - `spec` - repeated-record extraction for listing pages
//! - `direct` - single-record extraction for direct-hit pages

mod direct;
mod path;
mod rule;
mod spec;

pub use direct::*;
pub use path::*;
pub use rule::*;
pub use spec::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One extracted entity: its identifier and the transformed attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    identifier: String,
    fields: BTreeMap<String, Value>,
}

impl ExtractedRecord {
    pub fn new(identifier: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            identifier: identifier.into(),
            fields,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn into_parts(self) -> (String, BTreeMap<String, Value>) {
        (self.identifier, self.fields)
    }
}
