//! Search result parser
//!
//! Extracts entity records from search responses that come in two shapes:
//! - a listing page with one table row per candidate
//! - the entity's own detail page, when the search matched exactly one entity
//!
//! Listing rows are extracted declaratively (path expressions + postprocess
//! transforms); detail pages go through a small direct-hit scanner.

pub mod config;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod names;
pub mod preprocess;
pub mod registry;
pub mod resolution;

pub use config::*;
pub use error::{ParseError, PathError, RuleError};
pub use extractors::*;
pub use ffi::*;
pub use names::*;
pub use preprocess::*;
pub use registry::*;
pub use resolution::*;
