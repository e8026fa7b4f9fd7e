//! Configuration tree primitives.
//!
//! This module handles:
//! - Structural paths into a `serde_json::Value` tree
//! - Deep-merging override layers
//! - Walking string leaves with in-place replacement

pub mod merge;
pub mod path;
pub mod walk;

pub use merge::{CONFIG_PROCESSOR_KEY, deep_merge, merge_layers};
pub use path::{KeyPath, PathSegment, lookup_dotted};
pub use walk::{Visit, walk};
