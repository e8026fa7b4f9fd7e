use crate::directive::coerce::{Coerced, coerce_bool, coerce_int};
use crate::directive::deferred::DeferredReferences;
use crate::directive::parser::{Directive, Operator};
use crate::error::{ConfProcError, Result};
use crate::host::Host;
use crate::obfuscation::ObfuscationGate;
use crate::tree::{KeyPath, Visit, walk};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Number, Value};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Upper bound on the random bytes an `SFILE<n>` directive may generate.
pub const MAX_SECRET_BYTES: usize = 64 * 1024;

/// Payloads may be padded or not; URL-safe characters are mapped first.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new()
		.with_decode_padding_mode(DecodePaddingMode::Indifferent)
		.with_decode_allow_trailing_bits(true),
);

/// Default cap on how deeply directives may wrap one another
/// (`BOOL:ENV:...` resolving to yet another directive, and so on).
pub const DEFAULT_MAX_DIRECTIVE_DEPTH: usize = 32;

/// Result of resolving one leaf. `None` is absence: the leaf disappears from
/// its mapping.
pub type Resolved = Option<Value>;

/// Resolves directive leaves against a host and an obfuscation gate.
#[derive(Debug)]
pub struct Dispatcher<'a> {
	host: &'a Host,
	gate: ObfuscationGate<'a>,
	max_depth: usize,
}

impl<'a> Dispatcher<'a> {
	pub fn new(host: &'a Host, gate: ObfuscationGate<'a>, max_depth: usize) -> Self {
		Self {
			host,
			gate,
			max_depth,
		}
	}

	/// Resolve every directive in `tree` in place.
	///
	/// Pass 1 walks the tree and resolves leaves, recording `CONFIG:`
	/// references. Pass 2 fills those references from the pass-1 result.
	pub fn resolve_tree(&self, tree: &mut Value) -> Result<()> {
		let mut deferred = DeferredReferences::default();
		walk(tree, |path, leaf| self.visit_leaf(path, leaf, &mut deferred))?;

		if !deferred.is_empty() {
			debug!(count = deferred.len(), "resolving deferred CONFIG references");
		}
		deferred.resolve(tree);
		Ok(())
	}

	/// Entry point for leaves reached directly by the walker. Only here may
	/// `CONFIG:` appear, since only here is the leaf's location known.
	fn visit_leaf(
		&self,
		path: &KeyPath,
		leaf: &str,
		deferred: &mut DeferredReferences,
	) -> Result<Visit> {
		let Some(directive) = Directive::parse(leaf) else {
			return Ok(Visit::Keep);
		};

		if directive.operator == Operator::Config {
			debug!(path = %path, "deferring CONFIG reference");
			deferred.register(path.clone(), directive.payload);
			return Ok(Visit::Keep);
		}

		Ok(match self.apply(path, directive, 0)? {
			Some(value) => Visit::Replace(value),
			None => Visit::Remove,
		})
	}

	/// Resolve a string produced inside another operator (an environment
	/// value, file contents, a wrapped payload). Ordinary strings come back
	/// unchanged; `CONFIG:` is rejected.
	pub fn resolve_leaf(&self, path: &KeyPath, leaf: &str, depth: usize) -> Result<Resolved> {
		match Directive::parse(leaf) {
			None => Ok(Some(Value::String(leaf.to_string()))),
			Some(directive) => self.apply(path, directive, depth),
		}
	}

	fn apply(&self, path: &KeyPath, directive: Directive<'_>, depth: usize) -> Result<Resolved> {
		if depth > self.max_depth {
			return Err(ConfProcError::RecursionLimit {
				path: path.clone(),
				limit: self.max_depth,
			});
		}

		let Directive { operator, payload } = directive;
		debug!(path = %path, op = %operator, depth, "resolving directive");

		match operator {
			Operator::Raw => Ok(Some(Value::String(payload.to_string()))),

			Operator::HexStr => {
				let bytes = hex::decode(payload).map_err(|source| ConfProcError::InvalidHex {
					path: path.clone(),
					source,
				})?;
				utf8_value(bytes, path)
			}

			Operator::B64Str => {
				let bytes = LENIENT_BASE64
					.decode(standard_alphabet(payload))
					.map_err(|source| ConfProcError::InvalidBase64 {
						path: path.clone(),
						source,
					})?;
				utf8_value(bytes, path)
			}

			Operator::Env => {
				let value = self.lookup_env(payload);
				self.resolve_leaf(path, &value, depth + 1)
			}

			Operator::File => {
				let contents = self.read_file(Path::new(payload))?;
				self.resolve_leaf(path, &contents, depth + 1)
			}

			Operator::SecretFile { bytes } => {
				if bytes > MAX_SECRET_BYTES {
					return Err(ConfProcError::SecretTooLarge {
						path: path.clone(),
						bytes,
						limit: MAX_SECRET_BYTES,
					});
				}
				let secret = self.secret_file(Path::new(payload), bytes)?;
				Ok(Some(Value::String(secret)))
			}

			Operator::Bool => {
				let inner = self.resolve_leaf(path, payload, depth + 1)?;
				Ok(match coerce_bool(inner.as_ref()) {
					Coerced::Absent => None,
					Coerced::Null => Some(Value::Null),
					Coerced::Value(b) => Some(Value::Bool(b)),
				})
			}

			Operator::Int { radix } => {
				let inner = self.resolve_leaf(path, payload, depth + 1)?;
				match coerce_int(inner.as_ref(), radix) {
					Coerced::Absent => Ok(None),
					Coerced::Null => Ok(Some(Value::Null)),
					Coerced::Value(n) => number_value(n, path, inner.as_ref()).map(Some),
				}
			}

			Operator::Config => Err(ConfProcError::ConfigInRecursedOperator { path: path.clone() }),

			Operator::Obf => {
				let decoded = self.gate.decode(payload, path)?;
				Ok(Some(Value::String(decoded)))
			}
		}
	}

	/// `NAME` or `NAME:default`. Unset and empty variables fall back to the
	/// default, or to `""` when there is none.
	fn lookup_env(&self, payload: &str) -> String {
		let (name, default) = match payload.split_once(':') {
			Some((name, default)) => (name, Some(default)),
			None => (payload, None),
		};

		match self.host.env.var(name) {
			Some(value) if !value.is_empty() => value,
			_ => default.unwrap_or_default().to_string(),
		}
	}

	fn read_file(&self, path: &Path) -> Result<String> {
		self.host
			.fs
			.read_to_string(path)
			.map_err(|source| ConfProcError::FileRead {
				path: path.to_path_buf(),
				source,
			})
	}

	/// Read the secret at `path`, creating it from `bytes` random bytes
	/// (hex-encoded) the first time.
	fn secret_file(&self, path: &Path, bytes: usize) -> Result<String> {
		if self.host.fs.exists(path) {
			return self.read_file(path);
		}

		let mut buf = vec![0u8; bytes];
		self.host.random.fill(&mut buf);
		let secret = hex::encode(&buf);

		match self.host.fs.create_new(path, secret.as_bytes()) {
			Ok(()) => {
				info!(path = %path.display(), bytes, "created secret file");
				Ok(secret)
			}
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				debug!(path = %path.display(), "secret file appeared concurrently; reading it");
				self.read_file(path)
			}
			Err(source) => Err(ConfProcError::FileWrite {
				path: path.to_path_buf(),
				source,
			}),
		}
	}
}

/// Fold the URL-safe alphabet onto the standard one and drop whitespace.
fn standard_alphabet(payload: &str) -> String {
	payload
		.chars()
		.filter(|c| !c.is_ascii_whitespace())
		.map(|c| match c {
			'-' => '+',
			'_' => '/',
			other => other,
		})
		.collect()
}

fn utf8_value(bytes: Vec<u8>, path: &KeyPath) -> Result<Resolved> {
	String::from_utf8(bytes)
		.map(|text| Some(Value::String(text)))
		.map_err(|source| ConfProcError::InvalidUtf8 {
			path: path.clone(),
			source,
		})
}

/// Integral values become JSON integers. NaN and infinities have no JSON
/// form: NaN means no digits were found, infinity that they overflowed.
fn number_value(n: f64, path: &KeyPath, input: Option<&Value>) -> Result<Value> {
	if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
		return Ok(Value::from(n as i64));
	}

	let input = match input {
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
		None => String::new(),
	};
	if n.is_nan() {
		return Err(ConfProcError::NotAnInteger {
			path: path.clone(),
			input,
		});
	}

	Number::from_f64(n)
		.map(Value::Number)
		.ok_or_else(|| ConfProcError::IntegerOutOfRange {
			path: path.clone(),
			input,
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::host::{FileSystem, FixedRandom, MemoryFileSystem, StaticEnv};
	use crate::obfuscation::{Obfuscate, Obfuscator};
	use serde_json::json;
	use std::io;

	fn host() -> Host {
		Host::system()
			.with_env(
				StaticEnv::new()
					.with("NUM", "98765")
					.with("ZERO", "0")
					.with("EMPTY", "")
					.with("YES", "yes")
					.with("HEX", "1f")
					.with("NESTED", "RAW:from-env")
					.with("CONFIG_REF", "CONFIG:foo")
					.with("LOOP", "ENV:LOOP"),
			)
			.with_random(FixedRandom::repeat(42))
	}

	fn resolve(host: &Host, tree: Value) -> Result<Value> {
		let obfuscator = Obfuscator::default();
		let dispatcher = Dispatcher::new(
			host,
			ObfuscationGate::Active(&obfuscator),
			DEFAULT_MAX_DIRECTIVE_DEPTH,
		);
		let mut tree = tree;
		dispatcher.resolve_tree(&mut tree)?;
		Ok(tree)
	}

	#[test]
	fn test_plain_values_untouched() {
		let tree = json!({
			"a": "ABCDE",
			"b": true,
			"d": null,
			"e": [1, "A", null, true],
			"k": "ABC:DEF:GHI",
			"empty": ""
		});
		assert_eq!(resolve(&host(), tree.clone()).unwrap(), tree);
	}

	#[test]
	fn test_encoding_operators() {
		let cfg = resolve(
			&host(),
			json!({
				"f": "RAW:ABCDE",
				"g": "HEXSTR:5758595A",
				"h": "B64STR:TU5PUA==",
				"l": "RAW:",
				"r": "RAW:ENV:NUM"
			}),
		)
		.unwrap();

		assert_eq!(cfg["f"], "ABCDE");
		assert_eq!(cfg["g"], "WXYZ");
		assert_eq!(cfg["h"], "MNOP");
		assert_eq!(cfg["l"], "");
		assert_eq!(cfg["r"], "ENV:NUM");
	}

	#[test]
	fn test_base64_is_lenient() {
		let cfg = resolve(
			&host(),
			json!({
				"unpadded": "B64STR:TU5PUA",
				"url_safe": "B64STR:Pz8-",
				"url_safe_slash": "B64STR:Pz8_",
				"wrapped": "B64STR:TU5P\nUA=="
			}),
		)
		.unwrap();

		assert_eq!(cfg["unpadded"], "MNOP");
		assert_eq!(cfg["url_safe"], "??>");
		assert_eq!(cfg["url_safe_slash"], "???");
		assert_eq!(cfg["wrapped"], "MNOP");
	}

	#[test]
	fn test_malformed_encodings_fail() {
		assert!(matches!(
			resolve(&host(), json!({"g": "HEXSTR:zz"})),
			Err(ConfProcError::InvalidHex { .. })
		));
		assert!(matches!(
			resolve(&host(), json!({"h": "B64STR:%%%"})),
			Err(ConfProcError::InvalidBase64 { .. })
		));
		assert!(matches!(
			resolve(&host(), json!({"g": "HEXSTR:ff"})),
			Err(ConfProcError::InvalidUtf8 { .. })
		));
	}

	#[test]
	fn test_env_lookup_and_defaults() {
		let cfg = resolve(
			&host(),
			json!({
				"i": "ENV:NUM",
				"m": "ENV:DOES_NOT_EXIST",
				"a": "ENV:DOES_NOT_EXIST:default",
				"b": "ENV:DOES_NOT_EXIST:",
				"d": "ENV:ZERO:default",
				"e": "ENV:EMPTY:default",
				"colons": "ENV:DOES_NOT_EXIST:a:b",
				"nested": "ENV:NESTED"
			}),
		)
		.unwrap();

		assert_eq!(cfg["i"], "98765");
		assert_eq!(cfg["m"], "");
		assert_eq!(cfg["a"], "default");
		assert_eq!(cfg["b"], "");
		assert_eq!(cfg["d"], "0");
		assert_eq!(cfg["e"], "default");
		assert_eq!(cfg["colons"], "a:b");
		assert_eq!(cfg["nested"], "from-env");
	}

	#[test]
	fn test_bool_operator() {
		let cfg = resolve(
			&host(),
			json!({
				"a": "BOOL:true",
				"b": "BOOL:1",
				"c": "BOOL:yes",
				"d": "BOOL:",
				"e": "BOOL:false",
				"f": "BOOL:0",
				"g": "BOOL:ENV:YES"
			}),
		)
		.unwrap();

		assert_eq!(cfg["a"], true);
		assert_eq!(cfg["b"], true);
		assert_eq!(cfg["c"], true);
		assert!(cfg.get("d").is_none());
		assert_eq!(cfg["e"], false);
		assert_eq!(cfg["f"], false);
		assert_eq!(cfg["g"], true);
	}

	#[test]
	fn test_int_operators() {
		let cfg = resolve(
			&host(),
			json!({
				"a": "INT:10",
				"b": "INT:",
				"c": "INT:0",
				"d": "INT:ENV:NUM",
				"h1": "INT16:0000f",
				"h2": "INT16:1A",
				"h3": "INT16:ENV:HEX",
				"o1": "INT8:07",
				"o2": "INT8:11",
				"list": ["INT:1", "INT:"]
			}),
		)
		.unwrap();

		assert_eq!(cfg["a"], 10);
		assert!(cfg.get("b").is_none());
		assert_eq!(cfg["c"], 0);
		assert_eq!(cfg["d"], 98765);
		assert_eq!(cfg["h1"], 15);
		assert_eq!(cfg["h2"], 0x1A);
		assert_eq!(cfg["h3"], 0x1F);
		assert_eq!(cfg["o1"], 7);
		assert_eq!(cfg["o2"], 9);
		assert_eq!(cfg["list"], json!([1, null]));
	}

	#[test]
	fn test_int_not_a_number() {
		let err = resolve(&host(), json!({"a": "INT:foo"})).unwrap_err();
		match err {
			ConfProcError::NotAnInteger { path, input } => {
				assert_eq!(path.to_string(), r#"["a"]"#);
				assert_eq!(input, "foo");
			}
			other => panic!("Expected NotAnInteger, got {other:?}"),
		}
	}

	#[test]
	fn test_int_overflow_is_out_of_range() {
		let digits = "9".repeat(400);
		let err = resolve(&host(), json!({"a": format!("INT:{digits}")})).unwrap_err();
		assert!(matches!(
			err,
			ConfProcError::IntegerOutOfRange { input, .. } if input == digits
		));
	}

	#[test]
	fn test_file_operator() {
		let temp_dir = tempfile::tempdir().unwrap();
		let plain = temp_dir.path().join("a.txt");
		let chained = temp_dir.path().join("b.txt");
		std::fs::write(&plain, "ABCDE").unwrap();
		std::fs::write(&chained, "ENV:NUM").unwrap();

		let cfg = resolve(
			&host(),
			json!({
				"a": format!("FILE:{}", plain.display()),
				"b": format!("FILE:{}", chained.display())
			}),
		)
		.unwrap();

		assert_eq!(cfg["a"], "ABCDE");
		assert_eq!(cfg["b"], "98765");
	}

	#[test]
	fn test_missing_file_fails() {
		let temp_dir = tempfile::tempdir().unwrap();
		let missing = temp_dir.path().join("missing.txt");

		let err = resolve(&host(), json!({"a": format!("FILE:{}", missing.display())}))
			.unwrap_err();
		assert!(matches!(err, ConfProcError::FileRead { path, .. } if path == missing));
	}

	#[test]
	fn test_file_operators_use_host_filesystem() {
		let fs = MemoryFileSystem::new()
			.with_file("/run/secrets/db", "hunter2")
			.with_file("/run/secrets/port", "INT:5432");
		let host = host().with_fs(fs);

		let cfg = resolve(
			&host,
			json!({
				"password": "FILE:/run/secrets/db",
				"port": "FILE:/run/secrets/port",
				"session": "SFILE4:/run/secrets/session"
			}),
		)
		.unwrap();

		assert_eq!(cfg["password"], "hunter2");
		assert_eq!(cfg["port"], 5432);
		assert_eq!(cfg["session"], "2a2a2a2a");
		assert_eq!(
			host.fs.read_to_string(Path::new("/run/secrets/session")).unwrap(),
			"2a2a2a2a"
		);
	}

	/// Reports every path as missing, as if another writer created the file
	/// between the existence check and the write.
	struct LosesCreateRace(MemoryFileSystem);

	impl FileSystem for LosesCreateRace {
		fn read_to_string(&self, path: &Path) -> io::Result<String> {
			self.0.read_to_string(path)
		}

		fn exists(&self, _path: &Path) -> bool {
			false
		}

		fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
			self.0.create_new(path, contents)
		}
	}

	#[test]
	fn test_secret_file_reads_winner_after_lost_race() {
		let fs = MemoryFileSystem::new().with_file("/var/lib/app/key", "from-other-writer");
		let host = host().with_fs(LosesCreateRace(fs));

		let cfg = resolve(&host, json!({"key": "SFILE16:/var/lib/app/key"})).unwrap();
		assert_eq!(cfg["key"], "from-other-writer");
	}

	#[test]
	fn test_secret_file_missing_parent_fails() {
		let temp_dir = tempfile::tempdir().unwrap();
		let target = temp_dir.path().join("no-such-dir").join("key");

		let err = resolve(&host(), json!({"key": format!("SFILE8:{}", target.display())}))
			.unwrap_err();
		assert!(matches!(err, ConfProcError::FileWrite { path, .. } if path == target));
	}

	#[test]
	fn test_secret_file_size_is_bounded() {
		let err = resolve(
			&host(),
			json!({"a": "SFILE18446744073709551615:/var/lib/app/key"}),
		)
		.unwrap_err();
		assert!(matches!(
			err,
			ConfProcError::SecretTooLarge { limit: MAX_SECRET_BYTES, .. }
		));

		let over = format!("SFILE{}:/var/lib/app/key", MAX_SECRET_BYTES + 1);
		assert!(matches!(
			resolve(&host(), json!({"a": over})),
			Err(ConfProcError::SecretTooLarge { .. })
		));

		let host = host().with_fs(MemoryFileSystem::new());
		let at_limit = format!("SFILE{MAX_SECRET_BYTES}:/var/lib/app/key");
		let cfg = resolve(&host, json!({"a": at_limit})).unwrap();
		assert_eq!(cfg["a"].as_str().map(str::len), Some(MAX_SECRET_BYTES * 2));
	}

	#[test]
	fn test_secret_file_creates_then_reads() {
		let temp_dir = tempfile::tempdir().unwrap();
		let existing = temp_dir.path().join("a.txt");
		let fresh = temp_dir.path().join("b.txt");
		std::fs::write(&existing, "ABCDE").unwrap();

		let tree = json!({
			"a": format!("SFILE8:{}", existing.display()),
			"b": format!("SFILE8:{}", fresh.display())
		});

		let cfg = resolve(&host(), tree.clone()).unwrap();
		assert_eq!(cfg["a"], "ABCDE");
		assert_eq!(cfg["b"], "2a2a2a2a2a2a2a2a");
		assert_eq!(std::fs::read_to_string(&fresh).unwrap(), "2a2a2a2a2a2a2a2a");

		// A different random source must not matter once the file exists.
		let again = resolve(&host().with_random(FixedRandom::repeat(7)), tree).unwrap();
		assert_eq!(again["b"], "2a2a2a2a2a2a2a2a");
	}

	#[test]
	fn test_deferred_config() {
		let cfg = resolve(
			&host(),
			json!({
				"foo": "TEST",
				"bar": "CONFIG:foo",
				"a": {"b": "TEST2", "c": "CONFIG:a.b"},
				"d": [1, 2, 3],
				"e": "CONFIG:d.1",
				"env_seen": "CONFIG:num",
				"num": "ENV:NUM",
				"missing": "CONFIG:nope"
			}),
		)
		.unwrap();

		assert_eq!(cfg["bar"], "TEST");
		assert_eq!(cfg["a"]["c"], "TEST2");
		assert_eq!(cfg["d"], json!([1, 2, 3]));
		assert_eq!(cfg["e"], 2);
		assert_eq!(cfg["env_seen"], "98765");
		assert!(cfg.get("missing").is_none());
	}

	#[test]
	fn test_config_to_absent_leaf_is_absent() {
		let cfg = resolve(
			&host(),
			json!({
				"x": "INT:",
				"y": "CONFIG:x",
				"list": ["BOOL:", "CONFIG:list.0"]
			}),
		)
		.unwrap();

		assert!(cfg.get("x").is_none());
		assert!(cfg.get("y").is_none());
		assert_eq!(cfg["list"], json!([null, null]));
	}

	#[test]
	fn test_config_in_recursed_operator() {
		let err = resolve(&host(), json!({"foo": "TEST", "bar": "ENV:CONFIG_REF"})).unwrap_err();
		assert_eq!(
			err.to_string(),
			r#"Cannot use CONFIG in recursed operator: ["bar"]"#
		);

		let err = resolve(&host(), json!({"foo": "TEST", "bar": "BOOL:CONFIG:foo"})).unwrap_err();
		assert!(matches!(err, ConfProcError::ConfigInRecursedOperator { .. }));
	}

	#[test]
	fn test_obf_operator() {
		let obfuscator = Obfuscator::default();
		let encoded = obfuscator.encode_string("ObfStr1", None).unwrap();
		let host = host().with_env(StaticEnv::new().with("OBF_VAR", format!("OBF:{encoded}")));

		let cfg = resolve(
			&host,
			json!({"j": format!("OBF:{encoded}"), "n": "ENV:OBF_VAR"}),
		)
		.unwrap();
		assert_eq!(cfg["j"], "ObfStr1");
		assert_eq!(cfg["n"], "ObfStr1");
	}

	#[test]
	fn test_obf_refused_while_bootstrapping() {
		let host = host();
		let dispatcher =
			Dispatcher::new(&host, ObfuscationGate::Bootstrapping, DEFAULT_MAX_DIRECTIVE_DEPTH);
		let mut tree = json!({"obfuscator": {"defaultAlg": "OBF:b64:QQ=="}});

		let err = dispatcher.resolve_tree(&mut tree).unwrap_err();
		assert_eq!(
			err.to_string(),
			r#"Obfuscator not allowed at this time: ["obfuscator","defaultAlg"]"#
		);
	}

	#[test]
	fn test_recursion_limit() {
		let host = host();
		let obfuscator = Obfuscator::default();
		let dispatcher = Dispatcher::new(&host, ObfuscationGate::Active(&obfuscator), 4);
		let mut tree = json!({"loop": "ENV:LOOP"});

		let err = dispatcher.resolve_tree(&mut tree).unwrap_err();
		assert!(matches!(err, ConfProcError::RecursionLimit { limit: 4, .. }));
	}

	#[test]
	fn test_number_value() {
		let path = KeyPath::root();
		assert_eq!(number_value(42.0, &path, None).unwrap(), json!(42));
		assert_eq!(number_value(-3.0, &path, None).unwrap(), json!(-3));
		assert_eq!(number_value(1.5, &path, None).unwrap(), json!(1.5));
		assert!(matches!(
			number_value(f64::NAN, &path, None),
			Err(ConfProcError::NotAnInteger { .. })
		));
		assert!(matches!(
			number_value(f64::INFINITY, &path, None),
			Err(ConfProcError::IntegerOutOfRange { .. })
		));
	}
}
