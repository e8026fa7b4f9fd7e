use crate::directive::{DEFAULT_MAX_DIRECTIVE_DEPTH, Dispatcher};
use crate::error::{ConfProcError, Result};
use crate::host::Host;
use crate::obfuscation::{Obfuscate, ObfuscationGate, Obfuscator, ObfuscatorConfig};
use crate::tree::{CONFIG_PROCESSOR_KEY, merge_layers};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Settings read from the session's own `configProcessor` sub-tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorSettings {
	/// Configuration for the session obfuscator.
	pub obfuscator: ObfuscatorConfig,

	/// How deeply directives may wrap one another before resolution fails.
	pub max_directive_depth: usize,
}

impl Default for ProcessorSettings {
	fn default() -> Self {
		Self {
			obfuscator: ObfuscatorConfig::default(),
			max_directive_depth: DEFAULT_MAX_DIRECTIVE_DEPTH,
		}
	}
}

/// One configuration processing session.
///
/// Construction merges the override layers and bootstraps the obfuscator:
/// the `configProcessor` sub-tree is resolved first with `OBF:` disabled, and
/// the obfuscator is built from the result. Only then is `OBF:` available.
///
/// # Example
///
/// ```
/// use confproc_cli::ConfigProcessor;
/// use serde_json::json;
///
/// let processor = ConfigProcessor::new([
///     Some(json!({"name": "RAW:ENV:literally", "port": "INT:8080"})),
///     Some(json!({"alias": "CONFIG:name"})),
/// ])
/// .unwrap();
///
/// let cfg = processor.process().unwrap();
/// assert_eq!(cfg["name"], "ENV:literally");
/// assert_eq!(cfg["port"], 8080);
/// assert_eq!(cfg["alias"], "ENV:literally");
/// ```
pub struct ConfigProcessor {
	data: Value,
	settings: ProcessorSettings,
	host: Host,
	obfuscator: Box<dyn Obfuscate>,
}

impl ConfigProcessor {
	/// Start a session against the real environment and filesystem.
	pub fn new<I>(layers: I) -> Result<Self>
	where
		I: IntoIterator<Item = Option<Value>>,
	{
		Self::with_host(layers, Host::system())
	}

	/// Start a session against the given host capabilities.
	pub fn with_host<I>(layers: I, host: Host) -> Result<Self>
	where
		I: IntoIterator<Item = Option<Value>>,
	{
		Self::with_obfuscator(layers, host, |config| -> Box<dyn Obfuscate> {
			Box::new(Obfuscator::new(config.clone()))
		})
	}

	/// Start a session with a custom obfuscator, built from the
	/// bootstrap-resolved obfuscator settings.
	pub fn with_obfuscator<I, F>(layers: I, host: Host, build: F) -> Result<Self>
	where
		I: IntoIterator<Item = Option<Value>>,
		F: FnOnce(&ObfuscatorConfig) -> Box<dyn Obfuscate>,
	{
		let data = merge_layers(layers);
		let settings = bootstrap_settings(&data, &host)?;
		let obfuscator = build(&settings.obfuscator);

		debug!(
			max_directive_depth = settings.max_directive_depth,
			default_alg = %settings.obfuscator.default_alg,
			"config processor ready"
		);

		Ok(Self {
			data,
			settings,
			host,
			obfuscator,
		})
	}

	/// The merged tree before any directive is resolved.
	pub fn raw(&self) -> &Value {
		&self.data
	}

	pub fn settings(&self) -> &ProcessorSettings {
		&self.settings
	}

	/// Resolve a copy of the merged tree.
	///
	/// The session keeps its unresolved tree, so calling this again resolves
	/// afresh (an `SFILE` created by the first call is only read by the second).
	pub fn process(&self) -> Result<Value> {
		let mut tree = self.data.clone();
		self.dispatcher().resolve_tree(&mut tree)?;
		Ok(tree)
	}

	/// Resolve the merged tree, handing ownership to the caller.
	pub fn into_processed(self) -> Result<Value> {
		let Self {
			mut data,
			settings,
			host,
			obfuscator,
		} = self;

		Dispatcher::new(
			&host,
			ObfuscationGate::Active(obfuscator.as_ref()),
			settings.max_directive_depth,
		)
		.resolve_tree(&mut data)?;
		Ok(data)
	}

	/// Obfuscate `value` for use behind an `OBF:` directive.
	pub fn obfuscate_string(&self, value: &str, alg: Option<&str>) -> Result<String> {
		self.obfuscator.encode_string(value, alg)
	}

	fn dispatcher(&self) -> Dispatcher<'_> {
		Dispatcher::new(
			&self.host,
			ObfuscationGate::Active(self.obfuscator.as_ref()),
			self.settings.max_directive_depth,
		)
	}
}

impl fmt::Debug for ConfigProcessor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConfigProcessor")
			.field("data", &self.data)
			.field("settings", &self.settings)
			.field("host", &self.host)
			.finish_non_exhaustive()
	}
}

/// Resolve the `configProcessor` sub-tree with `OBF:` disabled and read the
/// session settings from it.
///
/// The sub-tree is resolved in place under its own key, so `CONFIG:` references
/// and error paths read the same as in the full pass
/// (`CONFIG:configProcessor.obfuscator.key`). Anything outside the sub-tree is
/// not visible yet and resolves as absent.
fn bootstrap_settings(data: &Value, host: &Host) -> Result<ProcessorSettings> {
	let section = match data.get(CONFIG_PROCESSOR_KEY) {
		Some(section @ Value::Object(_)) => section.clone(),
		_ => Value::Object(Map::new()),
	};
	let mut scope = Map::new();
	scope.insert(CONFIG_PROCESSOR_KEY.to_string(), section);
	let mut scope = Value::Object(scope);

	Dispatcher::new(
		host,
		ObfuscationGate::Bootstrapping,
		DEFAULT_MAX_DIRECTIVE_DEPTH,
	)
	.resolve_tree(&mut scope)?;

	let section = scope
		.get_mut(CONFIG_PROCESSOR_KEY)
		.map(Value::take)
		.unwrap_or_default();
	serde_json::from_value(section).map_err(|source| ConfProcError::InvalidSettings { source })
}
