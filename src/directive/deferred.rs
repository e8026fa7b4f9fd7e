use crate::tree::{KeyPath, lookup_dotted};
use serde_json::Value;
use tracing::{debug, warn};

/// A `CONFIG:` directive seen during the first pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredReference {
	/// Location of the leaf that holds the directive.
	pub target: KeyPath,

	/// Dotted reference into the resolved tree (`a.b`, `d.1`).
	pub source: String,
}

/// References collected during one resolution pass, in walk order.
#[derive(Debug, Default)]
pub struct DeferredReferences {
	pending: Vec<DeferredReference>,
}

impl DeferredReferences {
	pub fn register(&mut self, target: KeyPath, source: impl Into<String>) {
		self.pending.push(DeferredReference {
			target,
			source: source.into(),
		});
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Second pass: copy each referenced value into its target.
	///
	/// Lookups see the tree as the first pass left it, including earlier
	/// writes from this loop. A missing source makes the target absent.
	pub fn resolve(self, tree: &mut Value) {
		for reference in self.pending {
			let value = lookup_dotted(tree, &reference.source).cloned();
			if value.is_none() {
				warn!(
					target_path = %reference.target,
					source = %reference.source,
					"CONFIG reference does not resolve; leaving value absent"
				);
			} else {
				debug!(
					target_path = %reference.target,
					source = %reference.source,
					"resolved CONFIG reference"
				);
			}

			if !reference.target.assign(tree, value) {
				warn!(target_path = %reference.target, "CONFIG target no longer exists");
			}
		}
	}
}
