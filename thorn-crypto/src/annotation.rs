//! Propagates `{encrypted, packed, from_client}` bits from graph parameters
//! to the internal nodes that consume them, before execution begins.

use std::collections::HashMap;

/// The per-node annotation triple. `encrypted` spreads downward under any
/// operation whose inputs are encrypted; `packed` spreads under
/// shape-preserving operations; `from_client` marks a parameter bound at
/// call time from the offload session rather than supplied by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Annotation {
	/// Whether the tensor this node produces holds ciphertext slots.
	pub encrypted: bool,
	/// Whether the tensor's batch axis is folded into CKKS SIMD slots.
	pub packed: bool,
	/// Whether this parameter is bound from the client rather than the
	/// server at call time.
	pub from_client: bool,
}

impl Annotation {
	/// An annotation with all bits clear.
	pub fn none() -> Self {
		Self::default()
	}

	/// Merges two operands' annotations for a binary op: `encrypted` and
	/// `packed` both spread if either operand carries them; `from_client`
	/// has no downstream meaning past parameters, so it is always cleared
	/// on a derived node.
	pub fn merge(self, other: Annotation) -> Annotation {
		Annotation {
			encrypted: self.encrypted || other.encrypted,
			packed: self.packed && other.packed,
			from_client: false,
		}
	}
}

/// A graph node identifier. Annotation propagation is keyed on these, not
/// on tensor ids, since one node can produce several output tensors.
pub type NodeId = u64;

/// Whether an operator preserves packing: element-wise and most structural
/// ops do, while shape-reinterpreting ops like `Reshape`/`Broadcast` are
/// conservatively treated as packing-preserving only when the batch axis is
/// untouched by the caller's op_params (left to the kernel layer to assert).
pub trait PackingBehavior {
	/// True if this operator preserves `packed` across its inputs.
	fn preserves_packing(&self) -> bool;
}

/// Flows annotations transitively across a topologically ordered node list.
/// `parameters` seeds the externally assigned annotations; `edges` gives,
/// for each node in topological order, its input node ids and whether its
/// operator preserves packing. Returns the annotation computed for every
/// node, including the seeded parameters.
///
/// Applying this function twice over the same `edges`/`parameters` is
/// idempotent: the second pass recomputes the same fixed point, since
/// propagation here does not accumulate state across nodes beyond a single
/// forward sweep.
pub fn propagate(
	parameters: &HashMap<NodeId, Annotation>,
	edges: &[(NodeId, Vec<NodeId>, bool)],
) -> HashMap<NodeId, Annotation> {
	let mut annotations: HashMap<NodeId, Annotation> = parameters.clone();

	for (node, inputs, preserves_packing) in edges {
		let merged = inputs
			.iter()
			.filter_map(|input| annotations.get(input).copied())
			.fold(Annotation::none(), Annotation::merge);

		annotations.insert(
			*node,
			Annotation {
				encrypted: merged.encrypted,
				packed: merged.packed && *preserves_packing,
				from_client: false,
			},
		);
	}

	annotations
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encrypted_spreads_to_dependent_nodes() {
		let mut parameters = HashMap::new();
		parameters.insert(
			1,
			Annotation {
				encrypted: true,
				packed: true,
				from_client: true,
			},
		);

		let edges = vec![(2u64, vec![1u64], true)];
		let result = propagate(&parameters, &edges);

		let node_two = result.get(&2).unwrap();
		assert!(node_two.encrypted);
		assert!(node_two.packed);
		assert!(!node_two.from_client);
	}

	#[test]
	fn non_packing_op_clears_packed_downstream() {
		let mut parameters = HashMap::new();
		parameters.insert(1, Annotation { encrypted: false, packed: true, from_client: false });

		let edges = vec![(2u64, vec![1u64], false)];
		let result = propagate(&parameters, &edges);

		assert!(!result.get(&2).unwrap().packed);
	}

	#[test]
	fn propagation_is_idempotent() {
		let mut parameters = HashMap::new();
		parameters.insert(1, Annotation { encrypted: true, packed: true, from_client: false });

		let edges = vec![(2u64, vec![1u64], true), (3u64, vec![2u64], true)];

		let once = propagate(&parameters, &edges);
		let twice = propagate(&once, &edges);

		assert_eq!(once.get(&3), twice.get(&3));
	}
}
