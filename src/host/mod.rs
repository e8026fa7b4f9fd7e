//! Host capabilities used while resolving directives.
//!
//! This module handles:
//! - Environment variable lookup (`ENV:`)
//! - File reads and create-new writes (`FILE:`, `SFILE<n>:`)
//! - Random bytes for generated secrets
//!
//! Every capability is a trait so sessions can run against deterministic
//! doubles instead of the real process environment.

use rand::RngCore;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Reads environment variables by exact name.
pub trait EnvLookup {
	fn var(&self, name: &str) -> Option<String>;
}

/// The filesystem operations directives need.
pub trait FileSystem {
	fn read_to_string(&self, path: &Path) -> io::Result<String>;

	fn exists(&self, path: &Path) -> bool;

	/// Create `path` with `contents`, failing with `AlreadyExists` if it is
	/// already present.
	fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Source of random bytes for generated secrets.
pub trait RandomSource {
	fn fill(&self, buf: &mut [u8]);
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
	fn var(&self, name: &str) -> Option<String> {
		std::env::var(name).ok()
	}
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
	vars: HashMap<String, String>,
}

impl StaticEnv {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.vars.insert(name.into(), value.into());
		self
	}
}

impl EnvLookup for StaticEnv {
	fn var(&self, name: &str) -> Option<String> {
		self.vars.get(name).cloned()
	}
}

impl<K, V> FromIterator<(K, V)> for StaticEnv
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			vars: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
	fn read_to_string(&self, path: &Path) -> io::Result<String> {
		std::fs::read_to_string(path)
	}

	fn exists(&self, path: &Path) -> bool {
		path.exists()
	}

	fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
		let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
		file.write_all(contents)?;
		file.sync_all()
	}
}

/// An in-memory filesystem of whole files, for tests and embedding.
///
/// Files created through [`FileSystem::create_new`] are visible to later reads
/// on the same instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
	files: RefCell<HashMap<PathBuf, String>>,
}

impl MemoryFileSystem {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
		self.files.borrow_mut().insert(path.into(), contents.into());
		self
	}

	/// Current contents of `path`, if present.
	pub fn contents(&self, path: &Path) -> Option<String> {
		self.files.borrow().get(path).cloned()
	}
}

impl FileSystem for MemoryFileSystem {
	fn read_to_string(&self, path: &Path) -> io::Result<String> {
		self.contents(path)
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
	}

	fn exists(&self, path: &Path) -> bool {
		self.files.borrow().contains_key(path)
	}

	fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
		let text = String::from_utf8(contents.to_vec())
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

		let mut files = self.files.borrow_mut();
		if files.contains_key(path) {
			return Err(io::Error::new(io::ErrorKind::AlreadyExists, "file exists"));
		}
		files.insert(path.to_path_buf(), text);
		Ok(())
	}
}

/// Operating system randomness via `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
	fn fill(&self, buf: &mut [u8]) {
		rand::thread_rng().fill_bytes(buf);
	}
}

/// Repeats a byte pattern forever. Deterministic stand-in for [`OsRandom`].
#[derive(Debug, Clone)]
pub struct FixedRandom {
	pattern: Vec<u8>,
}

impl FixedRandom {
	pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
		Self {
			pattern: pattern.into(),
		}
	}

	pub fn repeat(byte: u8) -> Self {
		Self::new(vec![byte])
	}
}

impl RandomSource for FixedRandom {
	fn fill(&self, buf: &mut [u8]) {
		if self.pattern.is_empty() {
			buf.fill(0);
			return;
		}
		for (slot, byte) in buf.iter_mut().zip(self.pattern.iter().cycle()) {
			*slot = *byte;
		}
	}
}

/// The capabilities a processing session resolves against.
pub struct Host {
	pub env: Box<dyn EnvLookup>,
	pub fs: Box<dyn FileSystem>,
	pub random: Box<dyn RandomSource>,
}

impl Host {
	/// Real environment, local filesystem and OS randomness.
	pub fn system() -> Self {
		Self {
			env: Box::new(ProcessEnv),
			fs: Box::new(OsFileSystem),
			random: Box::new(OsRandom),
		}
	}

	pub fn with_env(mut self, env: impl EnvLookup + 'static) -> Self {
		self.env = Box::new(env);
		self
	}

	pub fn with_fs(mut self, fs: impl FileSystem + 'static) -> Self {
		self.fs = Box::new(fs);
		self
	}

	pub fn with_random(mut self, random: impl RandomSource + 'static) -> Self {
		self.random = Box::new(random);
		self
	}
}

impl Default for Host {
	fn default() -> Self {
		Self::system()
	}
}

impl std::fmt::Debug for Host {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Host").finish_non_exhaustive()
	}
}
