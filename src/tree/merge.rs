use serde_json::{Map, Value};
use tracing::warn;

/// Reserved top-level key holding the processor's own settings.
pub const CONFIG_PROCESSOR_KEY: &str = "configProcessor";

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive, overlay wins on conflict)
/// - Arrays: REPLACE (overlay wins entirely)
/// - Scalars: override (overlay wins)
/// - Null: override (an explicit clear, even over an object)
///
/// A key missing from the overlay leaves the base value untouched.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
	match (base, overlay) {
		(Value::Object(mut base_map), Value::Object(overlay_map)) => {
			for (key, overlay_value) in overlay_map {
				match base_map.get_mut(&key) {
					Some(slot) => {
						let base_value = slot.take();
						*slot = deep_merge(base_value, overlay_value);
					}
					None => {
						base_map.insert(key, overlay_value);
					}
				}
			}
			Value::Object(base_map)
		}

		(_, overlay) => overlay,
	}
}

/// Merge override layers in order (later layers win) on top of the implicit
/// session base `{"configProcessor": {}}`.
///
/// Absent (`None`) and `null` layers are no-ops. Top-level layers that are not
/// mappings carry no keys to merge and are skipped.
pub fn merge_layers<I>(layers: I) -> Value
where
	I: IntoIterator<Item = Option<Value>>,
{
	let mut base = Map::new();
	base.insert(CONFIG_PROCESSOR_KEY.to_string(), Value::Object(Map::new()));

	layers
		.into_iter()
		.enumerate()
		.fold(Value::Object(base), |acc, (index, layer)| match layer {
			None | Some(Value::Null) => acc,
			Some(layer @ Value::Object(_)) => deep_merge(acc, layer),
			Some(other) => {
				warn!(index, kind = kind_name(&other), "ignoring non-mapping layer");
				acc
			}
		})
}

fn kind_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "sequence",
		Value::Object(_) => "mapping",
	}
}
