use crate::error::Result;
use crate::tree::path::{KeyPath, PathSegment};
use serde_json::Value;

/// What the visitor wants done with a string leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Visit {
	/// Leave the leaf as it is.
	Keep,

	/// Write a new value in place of the leaf.
	Replace(Value),

	/// Drop the leaf: removed from a mapping, `null` inside a sequence.
	Remove,
}

/// Walk every string leaf of `tree` depth-first in pre-order, handing each one
/// to `visit` together with its structural path.
///
/// Booleans, numbers and nulls are never visited. Containers are entered
/// transparently. The visitor's decision is written back into the parent at
/// the same key or index. The first visitor error aborts the walk, leaving
/// earlier replacements in place.
///
/// An owned `Value` cannot hold a back-reference to an ancestor, so the walk
/// always terminates.
pub fn walk<F>(tree: &mut Value, mut visit: F) -> Result<()>
where
	F: FnMut(&KeyPath, &str) -> Result<Visit>,
{
	let mut path = KeyPath::root();
	match walk_node(tree, &mut path, &mut visit)? {
		Visit::Keep => {}
		Visit::Replace(value) => *tree = value,
		Visit::Remove => *tree = Value::Null,
	}
	Ok(())
}

fn walk_node<F>(node: &mut Value, path: &mut KeyPath, visit: &mut F) -> Result<Visit>
where
	F: FnMut(&KeyPath, &str) -> Result<Visit>,
{
	match node {
		Value::String(leaf) => visit(&*path, leaf.as_str()),

		Value::Array(items) => {
			for (index, item) in items.iter_mut().enumerate() {
				path.push(PathSegment::Index(index));
				let outcome = walk_node(item, path, visit);
				path.pop();

				match outcome? {
					Visit::Keep => {}
					Visit::Replace(value) => *item = value,
					Visit::Remove => *item = Value::Null,
				}
			}
			Ok(Visit::Keep)
		}

		Value::Object(map) => {
			let mut removed = Vec::new();

			for (key, child) in map.iter_mut() {
				path.push(PathSegment::Key(key.clone()));
				let outcome = walk_node(child, path, visit);
				path.pop();

				match outcome? {
					Visit::Keep => {}
					Visit::Replace(value) => *child = value,
					Visit::Remove => removed.push(key.clone()),
				}
			}

			for key in removed {
				map.shift_remove(&key);
			}
			Ok(Visit::Keep)
		}

		Value::Null | Value::Bool(_) | Value::Number(_) => Ok(Visit::Keep),
	}
}
