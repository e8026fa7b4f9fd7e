use crate::tree::KeyPath;
use std::path::PathBuf;

/// Library-level structured errors for confproc.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum ConfProcError {
	#[error("Unknown op processing config for: {path}")]
	UnknownOperator { tag: String, path: KeyPath },

	#[error("Cannot use CONFIG in recursed operator: {path}")]
	ConfigInRecursedOperator { path: KeyPath },

	#[error("Obfuscator not allowed at this time: {path}")]
	ObfuscatorUnavailable { path: KeyPath },

	#[error("Directive nesting exceeds {limit} levels at: {path}")]
	RecursionLimit { path: KeyPath, limit: usize },

	#[error("Value is not an integer at {path}: {input:?}")]
	NotAnInteger { path: KeyPath, input: String },

	#[error("Integer out of range at {path}: {input:?}")]
	IntegerOutOfRange { path: KeyPath, input: String },

	#[error("Secret of {bytes} bytes exceeds the {limit}-byte limit at: {path}")]
	SecretTooLarge {
		path: KeyPath,
		bytes: usize,
		limit: usize,
	},

	#[error("Invalid configProcessor settings")]
	InvalidSettings {
		#[source]
		source: serde_json::Error,
	},

	#[error("Failed to read file: {path}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to write file: {path}")]
	FileWrite {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid hex payload at: {path}")]
	InvalidHex {
		path: KeyPath,
		#[source]
		source: hex::FromHexError,
	},

	#[error("Invalid base64 payload at: {path}")]
	InvalidBase64 {
		path: KeyPath,
		#[source]
		source: base64::DecodeError,
	},

	#[error("Decoded payload is not valid UTF-8 at: {path}")]
	InvalidUtf8 {
		path: KeyPath,
		#[source]
		source: std::string::FromUtf8Error,
	},

	#[error("Unknown obfuscation algorithm: {alg}")]
	UnknownAlgorithm { alg: String },

	#[error("Malformed obfuscated value: {reason}")]
	MalformedObfuscated { reason: String },

	#[error("Obfuscated value failed integrity check (wrong key or salt?)")]
	ObfuscatedIntegrity,

	#[error("Failed to obfuscate value")]
	ObfuscationFailed,

	#[error("Failed to read layer file: {path}")]
	LayerReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse TOML layer file: {path}")]
	LayerParseToml {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to parse JSON layer file: {path}")]
	LayerParseJson {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("Unsupported layer file format (expected .toml or .json): {path}")]
	UnsupportedLayerFormat { path: PathBuf },

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Result type alias using ConfProcError.
pub type Result<T> = std::result::Result<T, ConfProcError>;
