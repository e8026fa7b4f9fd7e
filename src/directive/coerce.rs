use serde_json::Value;

/// Outcome of coercing a possibly-absent value.
///
/// `Absent` and `Null` are kept apart from any real value: an empty input means
/// "not configured", an explicit null stays null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
	Absent,
	Null,
	Value(T),
}

impl<T> Coerced<T> {
	/// The coerced value, if there is one.
	pub fn value(self) -> Option<T> {
		match self {
			Coerced::Value(v) => Some(v),
			Coerced::Absent | Coerced::Null => None,
		}
	}
}

/// Coerce a value to a boolean.
///
/// - absent or `""` → `Absent`
/// - `null` → `Null`
/// - booleans as-is, numbers are true unless zero
/// - `"0"`, `"false"`, `"no"` (any ASCII case) → false
/// - any other non-empty value → true
pub fn coerce_bool(value: Option<&Value>) -> Coerced<bool> {
	match value {
		None => Coerced::Absent,
		Some(Value::Null) => Coerced::Null,
		Some(Value::String(s)) if s.is_empty() => Coerced::Absent,
		Some(Value::String(s)) => Coerced::Value(!is_false_like(s)),
		Some(Value::Bool(b)) => Coerced::Value(*b),
		Some(Value::Number(n)) => Coerced::Value(n.as_f64().is_some_and(|f| f != 0.0)),
		Some(Value::Array(_) | Value::Object(_)) => Coerced::Value(true),
	}
}

fn is_false_like(s: &str) -> bool {
	["0", "false", "no"]
		.iter()
		.any(|candidate| s.eq_ignore_ascii_case(candidate))
}

/// Coerce a value to an integer in `radix`.
///
/// - absent or `""` → `Absent`
/// - `null` → `Null`
/// - numbers are returned as-is
/// - strings are parsed by their longest valid leading digit run, so trailing
///   garbage truncates (`"42foo"` → 42); a string with no leading digits
///   yields NaN, which is distinct from a parsed zero
pub fn coerce_int(value: Option<&Value>, radix: u32) -> Coerced<f64> {
	match value {
		None => Coerced::Absent,
		Some(Value::Null) => Coerced::Null,
		Some(Value::String(s)) if s.is_empty() => Coerced::Absent,
		Some(Value::String(s)) => Coerced::Value(parse_int_prefix(s, radix)),
		Some(Value::Number(n)) => Coerced::Value(n.as_f64().unwrap_or(f64::NAN)),
		Some(Value::Bool(_) | Value::Array(_) | Value::Object(_)) => Coerced::Value(f64::NAN),
	}
}

/// Leading-prefix integer parse: optional whitespace, optional sign, optional
/// `0x` when `radix` is 16, then as many digits as are valid in `radix`.
fn parse_int_prefix(input: &str, radix: u32) -> f64 {
	let s = input.trim_start();
	let (negative, s) = match s.as_bytes().first() {
		Some(b'-') => (true, &s[1..]),
		Some(b'+') => (false, &s[1..]),
		_ => (false, s),
	};
	let s = if radix == 16 {
		s.strip_prefix("0x")
			.or_else(|| s.strip_prefix("0X"))
			.unwrap_or(s)
	} else {
		s
	};

	let mut parsed: Option<f64> = None;
	for digit in s.chars().map_while(|c| c.to_digit(radix)) {
		parsed = Some(parsed.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
	}

	match parsed {
		Some(v) if negative => -v,
		Some(v) => v,
		None => f64::NAN,
	}
}
