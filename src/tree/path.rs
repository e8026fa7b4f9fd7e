use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
	/// Key into a mapping.
	Key(String),

	/// Index into a sequence.
	Index(usize),
}

/// Structural path from the root of a tree to a node.
///
/// Displays as a compact JSON array (`["a",0,"b"]`), which is how resolution
/// errors identify the offending leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<PathSegment>);

impl KeyPath {
	/// The empty path, addressing the root itself.
	pub fn root() -> Self {
		Self::default()
	}

	pub fn push(&mut self, segment: PathSegment) {
		self.0.push(segment);
	}

	pub fn pop(&mut self) -> Option<PathSegment> {
		self.0.pop()
	}

	/// Return a copy of this path extended by `segment`.
	pub fn child(&self, segment: PathSegment) -> Self {
		let mut path = self.clone();
		path.push(segment);
		path
	}

	/// Mutably borrow the node at this path.
	pub fn get_mut<'a>(&self, tree: &'a mut Value) -> Option<&'a mut Value> {
		self.0
			.iter()
			.try_fold(tree, |node, segment| match (node, segment) {
				(Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
				(Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
				_ => None,
			})
	}

	/// Write `value` at this path. `None` means absence: the key is removed
	/// from a mapping, or the slot becomes `null` in a sequence.
	///
	/// Returns false when the parent container no longer exists.
	pub fn assign(&self, tree: &mut Value, value: Option<Value>) -> bool {
		let Some((last, parent_segments)) = self.0.split_last() else {
			*tree = value.unwrap_or(Value::Null);
			return true;
		};

		let parent_path = KeyPath(parent_segments.to_vec());
		let Some(parent) = parent_path.get_mut(tree) else {
			return false;
		};

		match (parent, last) {
			(Value::Object(map), PathSegment::Key(key)) => {
				match value {
					Some(value) => {
						map.insert(key.clone(), value);
					}
					None => {
						map.shift_remove(key);
					}
				}
				true
			}
			(Value::Array(items), PathSegment::Index(index)) => match items.get_mut(*index) {
				Some(slot) => {
					*slot = value.unwrap_or(Value::Null);
					true
				}
				None => false,
			},
			_ => false,
		}
	}
}

impl fmt::Display for KeyPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
		f.write_str(&rendered)
	}
}

/// Look up a dotted reference such as `a.b`, `d.1` or `d[1].name`.
///
/// Numeric segments index sequences; against a mapping they are plain keys.
/// Any step that does not exist yields `None`.
pub fn lookup_dotted<'a>(tree: &'a Value, reference: &str) -> Option<&'a Value> {
	if reference.is_empty() {
		return None;
	}

	tokenize(reference)
		.into_iter()
		.try_fold(tree, |node, token| match node {
			Value::Object(map) => map.get(token),
			Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
			_ => None,
		})
}

/// Split `a.b[0].c` into `["a", "b", "0", "c"]`.
fn tokenize(reference: &str) -> Vec<&str> {
	let mut tokens = Vec::new();

	for part in reference.split('.') {
		let mut rest = part;
		match rest.find('[') {
			Some(0) => {}
			Some(open) => {
				tokens.push(&rest[..open]);
				rest = &rest[open..];
			}
			None => {
				tokens.push(rest);
				continue;
			}
		}

		while let Some(stripped) = rest.strip_prefix('[') {
			match stripped.find(']') {
				Some(close) => {
					tokens.push(&stripped[..close]);
					rest = &stripped[close + 1..];
				}
				None => {
					tokens.push(stripped);
					rest = "";
				}
			}
		}

		if !rest.is_empty() {
			tokens.push(rest);
		}
	}

	tokens
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn path(segments: Vec<PathSegment>) -> KeyPath {
		segments
			.into_iter()
			.fold(KeyPath::root(), |path, segment| path.child(segment))
	}

	#[test]
	fn test_display_as_json_array() {
		let p = path(vec![
			PathSegment::Key("e".to_string()),
			PathSegment::Index(2),
		]);
		assert_eq!(p.to_string(), r#"["e",2]"#);
		assert_eq!(KeyPath::root().to_string(), "[]");
	}

	#[test]
	fn test_tokenize() {
		assert_eq!(tokenize("a.b"), vec!["a", "b"]);
		assert_eq!(tokenize("d.1"), vec!["d", "1"]);
		assert_eq!(tokenize("d[1].name"), vec!["d", "1", "name"]);
		assert_eq!(tokenize("m[0][2]"), vec!["m", "0", "2"]);
	}

	#[test]
	fn test_lookup_dotted() {
		let tree = json!({
			"foo": "TEST",
			"a": {"b": "TEST2"},
			"d": [1, 2, {"name": "x"}],
			"n": {"1": "key-one"}
		});

		assert_eq!(lookup_dotted(&tree, "foo"), Some(&json!("TEST")));
		assert_eq!(lookup_dotted(&tree, "a.b"), Some(&json!("TEST2")));
		assert_eq!(lookup_dotted(&tree, "d.1"), Some(&json!(2)));
		assert_eq!(lookup_dotted(&tree, "d[2].name"), Some(&json!("x")));
		assert_eq!(lookup_dotted(&tree, "n.1"), Some(&json!("key-one")));
	}

	#[test]
	fn test_lookup_dotted_missing() {
		let tree = json!({"a": {"b": 1}, "d": [1]});
		assert_eq!(lookup_dotted(&tree, ""), None);
		assert_eq!(lookup_dotted(&tree, "nope"), None);
		assert_eq!(lookup_dotted(&tree, "a.b.c"), None);
		assert_eq!(lookup_dotted(&tree, "d.5"), None);
		assert_eq!(lookup_dotted(&tree, "d.x"), None);
	}

	#[test]
	fn test_assign_replaces_and_removes() {
		let mut tree = json!({"a": {"b": 1, "c": 2}, "list": [1, 2]});

		let b = path(vec![PathSegment::Key("a".into()), PathSegment::Key("b".into())]);
		assert!(b.assign(&mut tree, Some(json!("x"))));
		assert_eq!(tree["a"]["b"], "x");

		let c = path(vec![PathSegment::Key("a".into()), PathSegment::Key("c".into())]);
		assert!(c.assign(&mut tree, None));
		assert_eq!(tree["a"], json!({"b": "x"}));

		let item = path(vec![PathSegment::Key("list".into()), PathSegment::Index(1)]);
		assert!(item.assign(&mut tree, None));
		assert_eq!(tree["list"], json!([1, null]));
	}

	#[test]
	fn test_assign_missing_parent() {
		let mut tree = json!({"a": 1});
		let p = path(vec![PathSegment::Key("x".into()), PathSegment::Key("y".into())]);
		assert!(!p.assign(&mut tree, Some(json!(1))));
	}

	#[test]
	fn test_get_mut_follows_segments() {
		let mut tree = json!({"a": [{"b": true}]});
		let p = KeyPath::root()
			.child(PathSegment::Key("a".into()))
			.child(PathSegment::Index(0))
			.child(PathSegment::Key("b".into()));

		*p.get_mut(&mut tree).unwrap() = json!(false);
		assert_eq!(tree, json!({"a": [{"b": false}]}));
		assert!(path(vec![PathSegment::Index(0)]).get_mut(&mut tree).is_none());
	}
}
