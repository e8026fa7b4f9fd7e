//! Layer file loading for confproc.
//!
//! This module handles:
//! - TOML and JSON layer file parsing
//! - Directory cascade discovery
//! - Ordering layers for merging

pub mod cascade;
pub mod parser;
pub mod types;

pub use cascade::{discover_layers, merge_order, user_layer_path};
pub use parser::{parse_layer_file, parse_layer_str};
pub use types::{LayerFormat, LoadedLayer};
