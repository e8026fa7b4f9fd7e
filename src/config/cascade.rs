use crate::config::parser::parse_layer_file;
use crate::config::types::LoadedLayer;
use crate::directive::coerce_bool;
use crate::error::{ConfProcError, Result};
use crate::host::EnvLookup;
use crate::tree::CONFIG_PROCESSOR_KEY;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Layer file names looked for in each directory, in preference order.
pub const LAYER_FILE_NAMES: [&str; 2] = [".confproc.toml", ".confproc.json"];

/// File name of the per-user layer in the home directory.
pub const USER_LAYER_FILE_NAME: &str = ".confproc.toml";

/// Environment variable that, if truthy, skips the per-user layer.
/// Useful for CI environments.
pub const USER_LAYER_DISABLE_ENV: &str = "CONFPROC_NO_USER_CONFIG";

/// Discover and load all layer files in the cascade.
///
/// The cascade order is:
/// 1. Start from `start_dir` and look for `.confproc.toml` (or `.confproc.json`)
/// 2. If found and `configProcessor.root` is truthy, stop walking upwards
/// 3. Otherwise, continue up the directory tree
/// 4. Finally, check ~/.confproc.toml (unless disabled)
///
/// Returns layers in cascade order (most specific first).
pub fn discover_layers(start_dir: &Path, env: &dyn EnvLookup) -> Result<Vec<LoadedLayer>> {
	let mut layers = Vec::new();
	let mut current_dir = Some(start_dir);

	while let Some(dir) = current_dir {
		if let Some(layer_path) = find_layer_file(dir) {
			let layer = parse_layer_file(&layer_path)?;
			let stop = is_root_layer(&layer.value);
			debug!(path = %layer_path.display(), root = stop, "discovered layer");
			layers.push(layer);

			if stop {
				break;
			}
		}
		current_dir = dir.parent();
	}

	if let Some(user_layer) = load_user_layer(&layers, env)? {
		layers.push(user_layer);
	}

	Ok(layers)
}

fn find_layer_file(dir: &Path) -> Option<PathBuf> {
	LAYER_FILE_NAMES
		.iter()
		.map(|name| dir.join(name))
		.find(|path| path.is_file())
}

/// Whether a layer stops the upward walk.
///
/// Discovery happens before any directive is resolved, so only a literal
/// boolean counts. `root = "ENV:X"` is ignored rather than read as truthy.
fn is_root_layer(layer: &Value) -> bool {
	match layer.get(CONFIG_PROCESSOR_KEY).and_then(|section| section.get("root")) {
		Some(Value::Bool(root)) => *root,
		Some(other) => {
			warn!(value = %other, "ignoring non-boolean configProcessor.root");
			false
		}
		None => false,
	}
}

/// Load the user's ~/.confproc.toml if it exists and isn't disabled.
fn load_user_layer(existing: &[LoadedLayer], env: &dyn EnvLookup) -> Result<Option<LoadedLayer>> {
	if is_env_truthy(env, USER_LAYER_DISABLE_ENV) {
		return Ok(None);
	}

	let path = user_layer_path()?;
	if !path.is_file() || existing.iter().any(|layer| layer.path == path) {
		return Ok(None);
	}

	parse_layer_file(&path).map(Some)
}

/// Check if an environment variable is set to a truthy value.
fn is_env_truthy(env: &dyn EnvLookup, var_name: &str) -> bool {
	env.var(var_name)
		.map(|value| coerce_bool(Some(&Value::String(value))).value().unwrap_or(false))
		.unwrap_or(false)
}

/// Reorder cascade layers for merging: least specific first, so the layer
/// closest to the start directory wins.
pub fn merge_order(mut layers: Vec<LoadedLayer>) -> Vec<LoadedLayer> {
	layers.reverse();
	layers
}

/// Get the path to the user's layer file.
pub fn user_layer_path() -> Result<PathBuf> {
	let home_dir = dirs::home_dir().ok_or(ConfProcError::HomeDirectoryNotFound)?;
	Ok(home_dir.join(USER_LAYER_FILE_NAME))
}
