//! Confproc - layered configuration with directive resolution.
//!
//! This library provides the core functionality for confproc, including:
//! - Deep-merging override layers into one configuration tree
//! - Resolving `ENV:`, `FILE:`, `SFILE<n>:`, `HEXSTR:`, `B64STR:`, `BOOL:`,
//!   `INT:`, `CONFIG:`, `OBF:` and `RAW:` directives on string leaves
//! - Reversible obfuscation of secrets, bootstrapped from the tree itself
//! - Layer file discovery for the CLI
//!
//! # Example
//!
//! ```no_run
//! use confproc_cli::ConfigProcessor;
//! use serde_json::json;
//!
//! let defaults = json!({
//!     "database": {"host": "localhost", "port": "INT:ENV:DB_PORT:5432"},
//!     "debug": "BOOL:ENV:APP_DEBUG:false"
//! });
//! let deployment = json!({
//!     "database": {"password": "FILE:/run/secrets/db_password"},
//!     "session_key": "SFILE32:/var/lib/app/session.key"
//! });
//!
//! let processor = ConfigProcessor::new([Some(defaults), Some(deployment)]).unwrap();
//! let config = processor.process().unwrap();
//!
//! println!("{}", config["database"]["port"]);
//! ```

pub mod config;
pub mod directive;
pub mod error;
pub mod host;
pub mod obfuscation;
pub mod processor;
pub mod tree;

pub use directive::{Coerced, coerce_bool, coerce_int};
pub use error::{ConfProcError, Result};
pub use host::Host;
pub use obfuscation::{Obfuscate, Obfuscator, ObfuscatorConfig};
pub use processor::{ConfigProcessor, ProcessorSettings};
