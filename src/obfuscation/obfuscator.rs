use crate::error::{ConfProcError, Result};
use crate::obfuscation::Obfuscate;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::sync::OnceLock;

/// ChaCha20-Poly1305 under a PBKDF2-derived key.
pub const ALG_C20P1305: &str = "c20p1305";

/// Plain base64. Hides nothing; handy for fixtures.
pub const ALG_B64: &str = "b64";

const DEFAULT_KEY: &str = "confproc:default-obfuscation-key";
const SALT_PREFIX: &[u8] = b"confproc-obfuscator:";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
/// The key is derived once per obfuscator, from configuration rather than a
/// passphrase typed per call, so a lighter count than bundle encryption.
const KDF_ITERS: u32 = 10_000;

/// Settings read from `configProcessor.obfuscator`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObfuscatorConfig {
	/// Algorithm used when `encode_string` is not given one.
	pub default_alg: String,

	/// Passphrase the cipher key is derived from.
	pub key: String,

	/// Per-deployment salt for the key derivation.
	pub salt: String,
}

impl Default for ObfuscatorConfig {
	fn default() -> Self {
		Self {
			default_alg: ALG_C20P1305.to_string(),
			key: DEFAULT_KEY.to_string(),
			salt: String::new(),
		}
	}
}

impl fmt::Debug for ObfuscatorConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObfuscatorConfig")
			.field("default_alg", &self.default_alg)
			.field("key", &"<redacted>")
			.field("salt", &"<redacted>")
			.finish()
	}
}

/// Reversible obfuscation of configuration secrets.
///
/// Encoded values look like `<alg>:<base64 body>`, so they can sit directly
/// behind an `OBF:` directive. For `c20p1305` the body is
/// `nonce ‖ ciphertext ‖ tag`.
#[derive(Clone, Default)]
pub struct Obfuscator {
	config: ObfuscatorConfig,
	derived_key: OnceLock<[u8; KEY_LEN]>,
}

impl Obfuscator {
	pub fn new(config: ObfuscatorConfig) -> Self {
		Self {
			config,
			derived_key: OnceLock::new(),
		}
	}

	/// Derived on first use, so sessions that never touch `OBF:` skip the KDF.
	fn cipher(&self) -> ChaCha20Poly1305 {
		let key = self.derived_key.get_or_init(|| {
			let mut salt = SALT_PREFIX.to_vec();
			salt.extend_from_slice(self.config.salt.as_bytes());

			let mut key = [0u8; KEY_LEN];
			pbkdf2_hmac::<Sha256>(self.config.key.as_bytes(), &salt, KDF_ITERS, &mut key);
			key
		});
		ChaCha20Poly1305::new(Key::from_slice(key))
	}

	fn encrypt(&self, value: &str) -> Result<String> {
		let mut nonce = [0u8; NONCE_LEN];
		rand::thread_rng().fill_bytes(&mut nonce);

		let ciphertext = self
			.cipher()
			.encrypt(Nonce::from_slice(&nonce), value.as_bytes())
			.map_err(|_| ConfProcError::ObfuscationFailed)?;

		let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
		body.extend_from_slice(&nonce);
		body.extend_from_slice(&ciphertext);
		Ok(STANDARD.encode(body))
	}

	fn decrypt(&self, body: &str) -> Result<String> {
		let raw = decode_body(body)?;
		if raw.len() < NONCE_LEN + TAG_LEN {
			return Err(ConfProcError::MalformedObfuscated {
				reason: "body too short".to_string(),
			});
		}

		let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
		let plaintext = self
			.cipher()
			.decrypt(Nonce::from_slice(nonce), ciphertext)
			.map_err(|_| ConfProcError::ObfuscatedIntegrity)?;
		into_text(plaintext)
	}
}

impl fmt::Debug for Obfuscator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Obfuscator")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl Obfuscate for Obfuscator {
	fn encode_string(&self, value: &str, alg: Option<&str>) -> Result<String> {
		let alg = alg.unwrap_or(&self.config.default_alg);
		let body = match alg {
			ALG_C20P1305 => self.encrypt(value)?,
			ALG_B64 => STANDARD.encode(value.as_bytes()),
			other => {
				return Err(ConfProcError::UnknownAlgorithm {
					alg: other.to_string(),
				});
			}
		};
		Ok(format!("{alg}:{body}"))
	}

	fn decode_string(&self, value: &str) -> Result<String> {
		let (alg, body) =
			value
				.split_once(':')
				.ok_or_else(|| ConfProcError::MalformedObfuscated {
					reason: "missing algorithm prefix".to_string(),
				})?;

		match alg {
			ALG_C20P1305 => self.decrypt(body),
			ALG_B64 => into_text(decode_body(body)?),
			other => Err(ConfProcError::UnknownAlgorithm {
				alg: other.to_string(),
			}),
		}
	}
}

fn decode_body(body: &str) -> Result<Vec<u8>> {
	STANDARD
		.decode(body)
		.map_err(|e| ConfProcError::MalformedObfuscated {
			reason: e.to_string(),
		})
}

fn into_text(bytes: Vec<u8>) -> Result<String> {
	String::from_utf8(bytes).map_err(|_| ConfProcError::MalformedObfuscated {
		reason: "decoded value is not UTF-8".to_string(),
	})
}
