use crate::config::types::{LayerFormat, LoadedLayer};
use crate::error::{ConfProcError, Result};
use serde_json::Value;
use std::path::Path;

/// Parse a layer file from the given path. The extension picks the format.
pub fn parse_layer_file(path: &Path) -> Result<LoadedLayer> {
	let format = LayerFormat::from_path(path).ok_or_else(|| {
		ConfProcError::UnsupportedLayerFormat {
			path: path.to_path_buf(),
		}
	})?;

	let content = std::fs::read_to_string(path).map_err(|source| ConfProcError::LayerReadError {
		path: path.to_path_buf(),
		source,
	})?;

	let value = parse_layer_str(&content, format, path)?;
	Ok(LoadedLayer {
		value,
		path: path.to_path_buf(),
	})
}

/// Parse a layer from a string (useful for testing).
pub fn parse_layer_str(content: &str, format: LayerFormat, path: &Path) -> Result<Value> {
	match format {
		LayerFormat::Toml => {
			toml::from_str(content).map_err(|source| ConfProcError::LayerParseToml {
				path: path.to_path_buf(),
				source,
			})
		}
		LayerFormat::Json => {
			serde_json::from_str(content).map_err(|source| ConfProcError::LayerParseJson {
				path: path.to_path_buf(),
				source,
			})
		}
	}
}
