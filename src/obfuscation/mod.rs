//! Reversible obfuscation of secrets and the gate that guards it.
//!
//! The obfuscator is configured from `configProcessor.obfuscator`, which is
//! itself resolved through the directive engine. That first resolution runs
//! with the gate in [`ObfuscationGate::Bootstrapping`], so an `OBF:` value can
//! never be used to configure the obfuscator that would decode it.

pub mod obfuscator;

pub use obfuscator::{ALG_B64, ALG_C20P1305, Obfuscator, ObfuscatorConfig};

use crate::error::{ConfProcError, Result};
use crate::tree::KeyPath;

/// Encode/decode capability behind `OBF:` directives.
pub trait Obfuscate {
	/// Encode `value` with `alg`, or the configured default algorithm.
	fn encode_string(&self, value: &str, alg: Option<&str>) -> Result<String>;

	/// Decode a value previously produced by `encode_string`.
	fn decode_string(&self, value: &str) -> Result<String>;
}

/// Whether `OBF:` directives can be resolved yet.
#[derive(Clone, Copy)]
pub enum ObfuscationGate<'a> {
	/// Resolving the obfuscator's own settings; `OBF:` is refused.
	Bootstrapping,

	/// The session obfuscator is built.
	Active(&'a dyn Obfuscate),
}

impl ObfuscationGate<'_> {
	/// Decode `payload` for the leaf at `path`.
	pub fn decode(&self, payload: &str, path: &KeyPath) -> Result<String> {
		match self {
			ObfuscationGate::Bootstrapping => Err(ConfProcError::ObfuscatorUnavailable {
				path: path.clone(),
			}),
			ObfuscationGate::Active(obfuscator) => obfuscator.decode_string(payload),
		}
	}
}

impl std::fmt::Debug for ObfuscationGate<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ObfuscationGate::Bootstrapping => f.write_str("Bootstrapping"),
			ObfuscationGate::Active(_) => f.write_str("Active"),
		}
	}
}
