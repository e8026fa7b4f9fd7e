//! The directive mini-language and its resolution.
//!
//! This module handles:
//! - Recognizing `TAG:payload` prefixes on string leaves
//! - Dispatching each operator, re-resolving wrapped payloads
//! - Boolean and integer coercion
//! - Deferred `CONFIG:` references resolved in a second pass

pub mod coerce;
pub mod deferred;
pub mod dispatch;
pub mod parser;

pub use coerce::{Coerced, coerce_bool, coerce_int};
pub use deferred::{DeferredReference, DeferredReferences};
pub use dispatch::{DEFAULT_MAX_DIRECTIVE_DEPTH, Dispatcher, Resolved};
pub use parser::{Directive, Operator};
