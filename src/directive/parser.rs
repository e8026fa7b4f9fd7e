use crate::error::{ConfProcError, Result};
use crate::tree::KeyPath;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Reserved tags, anchored at the start of the leaf. `SFILE` requires a byte
/// count. The payload is everything after the first `:` that follows the tag.
static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?s)^(RAW|HEXSTR|B64STR|ENV|FILE|OBF|BOOL|INT|INT16|INT8|CONFIG|SFILE(\d+)):(.*)$",
	)
	.expect("directive pattern is valid")
});

/// A directive operator with its numeric sub-argument, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
	Raw,
	HexStr,
	B64Str,
	Env,
	File,
	/// `SFILE<n>`: persisted secret of `bytes` random bytes.
	SecretFile { bytes: usize },
	Bool,
	Int { radix: u32 },
	Config,
	Obf,
}

impl Operator {
	/// Look up an operator by tag. `sub_arg` is the `SFILE` byte count.
	pub fn from_tag(tag: &str, sub_arg: Option<usize>, path: &KeyPath) -> Result<Self> {
		let op = match (tag, sub_arg) {
			("RAW", None) => Operator::Raw,
			("HEXSTR", None) => Operator::HexStr,
			("B64STR", None) => Operator::B64Str,
			("ENV", None) => Operator::Env,
			("FILE", None) => Operator::File,
			("BOOL", None) => Operator::Bool,
			("INT", None) => Operator::Int { radix: 10 },
			("INT16", None) => Operator::Int { radix: 16 },
			("INT8", None) => Operator::Int { radix: 8 },
			("CONFIG", None) => Operator::Config,
			("OBF", None) => Operator::Obf,
			(t, Some(bytes)) if t.starts_with("SFILE") => Operator::SecretFile { bytes },
			_ => {
				return Err(ConfProcError::UnknownOperator {
					tag: tag.to_string(),
					path: path.clone(),
				});
			}
		};
		Ok(op)
	}
}

impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operator::Raw => f.write_str("RAW"),
			Operator::HexStr => f.write_str("HEXSTR"),
			Operator::B64Str => f.write_str("B64STR"),
			Operator::Env => f.write_str("ENV"),
			Operator::File => f.write_str("FILE"),
			Operator::SecretFile { bytes } => write!(f, "SFILE{bytes}"),
			Operator::Bool => f.write_str("BOOL"),
			Operator::Int { radix: 10 } => f.write_str("INT"),
			Operator::Int { radix } => write!(f, "INT{radix}"),
			Operator::Config => f.write_str("CONFIG"),
			Operator::Obf => f.write_str("OBF"),
		}
	}
}

/// A string leaf split into operator and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
	pub operator: Operator,
	pub payload: &'a str,
}

impl<'a> Directive<'a> {
	/// Recognize a directive prefix on `leaf`.
	///
	/// Returns `None` for ordinary strings, including ones that merely contain
	/// colons (`"ABC:DEF:GHI"`). An `SFILE` byte count too large for `usize` is
	/// not treated as a directive either.
	pub fn parse(leaf: &'a str) -> Option<Self> {
		let caps = DIRECTIVE_PATTERN.captures(leaf)?;
		let tag = caps.get(1)?.as_str();
		let payload = caps.get(3)?.as_str();

		let sub_arg = match caps.get(2) {
			Some(digits) => Some(digits.as_str().parse::<usize>().ok()?),
			None => None,
		};

		// Every tag the pattern accepts is in the table.
		let operator = Operator::from_tag(tag, sub_arg, &KeyPath::root()).ok()?;
		Some(Directive { operator, payload })
	}
}
