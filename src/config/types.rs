use serde_json::Value;
use std::path::{Path, PathBuf};

/// On-disk formats a layer file can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
	Toml,
	Json,
}

impl LayerFormat {
	/// Pick the format from the file extension.
	pub fn from_path(path: &Path) -> Option<Self> {
		match path.extension()?.to_str()? {
			"toml" => Some(LayerFormat::Toml),
			"json" => Some(LayerFormat::Json),
			_ => None,
		}
	}
}

/// A parsed override layer with its source path for debugging/display.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLayer {
	/// The parsed layer tree, directives still unresolved.
	pub value: Value,

	/// The path this layer was loaded from.
	pub path: PathBuf,
}
