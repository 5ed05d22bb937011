//! Graph construction and execution (spec §4.2, §4.4). A [`Graph`] is a
//! flat, already-topologically-sorted node list; [`Executor`] walks it once
//! per [`Executor::call`], dispatching each node to its
//! [`crate::kernel`] function and freeing any input slot whose last
//! consumer has just run.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thorn_seal::{CKKSEncoder, CKKSEvaluator, Context, Encryptor, RelinearizationKey, SymAsym};
use tracing::{debug, warn};

use thorn_core::Session;
use thorn_crypto::annotation::{self, Annotation, NodeId};
use thorn_crypto::config::{EnvConfig, TensorAttributes};
use thorn_crypto::{HEType, PlaintextVector};

use crate::error::{Error, Result};
use crate::kernel::{batch_norm, elementwise, nonlinear, reduce, structural, KernelContext};
use crate::offload;
use crate::op::OpId;

/// One node in a flattened, already topologically-sorted graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: u64,
	pub op: OpId,
	pub inputs: Vec<u64>,
	/// Operator-specific parameters, in the same hand-framed JSON style as
	/// [`thorn_core::message::FunctionMessage`]'s descriptor: e.g. `Dot`
	/// carries `{"m": .., "k": .., "n": ..}`, `Parameter`/`Result` carry
	/// `{"name": "..."}`, `Constant` carries `{"values": [..]}`.
	#[serde(default)]
	pub params: Value,
}

/// A flat, topologically-sorted operator graph (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
	pub nodes: Vec<Node>,
	pub output_ids: Vec<u64>,
}

/// The executor's lifecycle (spec §4.4): `Built` before any client is
/// involved, `ServerSetup` once a [`Session`] has been accepted and keys
/// exchanged, `Running` for the duration of a [`Executor::call`], `Done`
/// once the graph's outputs have been produced for the last time the
/// caller intends to invoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
	Built,
	ServerSetup,
	Running,
	Done,
}

/// Holds the compiled graph and borrows the live CKKS handles plus the
/// optional client session used for offloaded nonlinear ops. The handles
/// are borrowed, not owned, since none of `thorn_seal`'s wrapper types are
/// `Clone` and a backend only ever needs one live context per process.
pub struct Executor<'a> {
	graph: Graph,
	context: &'a Context,
	evaluator: &'a CKKSEvaluator,
	encoder: &'a CKKSEncoder,
	relin_keys: &'a RelinearizationKey,
	encryptor: &'a Encryptor<SymAsym>,
	/// Per-tensor `{encrypt, packed, client_input}` bits, keyed by parameter
	/// name, seeding annotation propagation (spec §4.4 step 3).
	tensors: HashMap<String, TensorAttributes>,
	env: EnvConfig,
	session: Option<Arc<Session>>,
	state: ExecutorState,
}

impl<'a> Executor<'a> {
	/// Builds an executor around an already-compiled [`Graph`] and live CKKS
	/// handles. `session` is `None` in non-client mode; nodes requiring
	/// client-aided offload then fail with [`Error::UnsupportedOp`].
	pub fn new(
		graph: Graph,
		context: &'a Context,
		evaluator: &'a CKKSEvaluator,
		encoder: &'a CKKSEncoder,
		relin_keys: &'a RelinearizationKey,
		encryptor: &'a Encryptor<SymAsym>,
		tensors: HashMap<String, TensorAttributes>,
		session: Option<Arc<Session>>,
	) -> Self {
		let state = if session.is_some() { ExecutorState::ServerSetup } else { ExecutorState::Built };
		Executor { graph, context, evaluator, encoder, relin_keys, encryptor, tensors, env: EnvConfig::from_env(), session, state }
	}

	pub fn state(&self) -> ExecutorState {
		self.state
	}

	/// Runs the graph once against `inputs` (keyed by `Parameter` node
	/// name), returning every `Result` node's tensor keyed by its name.
	///
	/// Implements spec §4.4's call algorithm: bind parameters, walk nodes in
	/// order dispatching each to its kernel, track per-node output slots in
	/// a map keyed by node id, and collect the named `Result` outputs.
	pub fn call(&mut self, inputs: &HashMap<String, Vec<HEType>>) -> Result<HashMap<String, Vec<HEType>>> {
		self.state = ExecutorState::Running;
		let mut slots: HashMap<u64, Vec<HEType>> = HashMap::new();
		let mut outputs = HashMap::new();
		let annotations = self.propagate_annotations()?;

		let kctx = KernelContext {
			context: self.context,
			evaluator: self.evaluator,
			encoder: self.encoder,
			relin_keys: self.relin_keys,
			encryptor: self.encryptor,
			lazy_mod: self.env.lazy_mod,
		};

		for node in &self.graph.nodes {
			let verbose = self.env.is_verbose(&format!("{:?}", node.op));
			if verbose {
				debug!(node_id = node.id, op = ?node.op, "dispatching node");
			}

			let mut output = dispatch_node(node, &slots, &kctx, self.session.as_deref(), inputs)?;

			if node.op == OpId::Parameter {
				let encrypted = annotations.get(&node.id).map(|a| a.encrypted).unwrap_or(false);
				if encrypted {
					output = encrypt_bound_parameter(&kctx, output)?;
				}
			}

			if verbose {
				debug!(node_id = node.id, slot_count = output.len(), "node complete");
			}

			if node.op == OpId::Result {
				let name = node_name(node)?;
				outputs.insert(name, output.clone());
			}

			slots.insert(node.id, output);
			free_dead_inputs(node, &self.graph, &mut slots);
		}

		self.state = ExecutorState::Done;
		Ok(outputs)
	}

	/// Flows `{encrypted, packed, from_client}` from each `Parameter` node's
	/// bound tensor attributes across the graph (spec §4.4 step 3), seeding
	/// the parameter annotations from `self.tensors` and propagating them
	/// along every other node's inputs per [`OpId::preserves_packing`].
	fn propagate_annotations(&self) -> Result<HashMap<NodeId, Annotation>> {
		let mut parameters = HashMap::new();
		for node in &self.graph.nodes {
			if node.op == OpId::Parameter {
				let name = node_name(node)?;
				let attrs = self.tensors.get(&name).copied().unwrap_or_default();
				parameters.insert(
					node.id,
					Annotation { encrypted: attrs.encrypt, packed: attrs.packed, from_client: attrs.client_input },
				);
			}
		}

		let edges: Vec<(NodeId, Vec<NodeId>, bool)> = self
			.graph
			.nodes
			.iter()
			.filter(|n| n.op != OpId::Parameter)
			.map(|n| (n.id, n.inputs.clone(), n.op.preserves_packing()))
			.collect();

		Ok(annotation::propagate(&parameters, &edges))
	}
}

/// Encrypts every plaintext slot of a bound parameter whose annotation
/// declared `encrypted` (spec §4.4 step 3); ciphertext slots pass through.
fn encrypt_bound_parameter(kctx: &KernelContext, slots: Vec<HEType>) -> Result<Vec<HEType>> {
	slots
		.into_iter()
		.map(|slot| match slot.as_plain() {
			Some(plain) => {
				let encoded = kctx.encoder.encode_f64(&plain.0)?;
				Ok(HEType::cipher(kctx.encryptor.encrypt(&encoded)?, slot.complex_packing()))
			}
			None => Ok(slot),
		})
		.collect()
}

fn node_name(node: &Node) -> Result<String> {
	node.params
		.get("name")
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| Error::ShapeMismatch(format!("node {} is missing a \"name\" parameter", node.id)))
}

fn input_slots<'a>(node: &Node, slots: &'a HashMap<u64, Vec<HEType>>) -> Result<Vec<&'a [HEType]>> {
	node.inputs
		.iter()
		.map(|id| slots.get(id).map(Vec::as_slice).ok_or(Error::MissingNode(*id)))
		.collect()
}

/// A node's output slots are freed from `slots` once every node that
/// consumes it has run (spec §4.4: "liveness-driven free list").
fn free_dead_inputs(just_ran: &Node, graph: &Graph, slots: &mut HashMap<u64, Vec<HEType>>) {
	for &input_id in &just_ran.inputs {
		let still_needed = graph
			.nodes
			.iter()
			.skip_while(|n| n.id != just_ran.id)
			.skip(1)
			.any(|n| n.inputs.contains(&input_id));
		if !still_needed && !graph.output_ids.contains(&input_id) {
			slots.remove(&input_id);
		}
	}
}

fn dispatch_node(
	node: &Node,
	slots: &HashMap<u64, Vec<HEType>>,
	kctx: &KernelContext,
	session: Option<&Session>,
	inputs: &HashMap<String, Vec<HEType>>,
) -> Result<Vec<HEType>> {
	match node.op {
		OpId::Parameter => {
			let name = node_name(node)?;
			inputs
				.get(&name)
				.cloned()
				.ok_or_else(|| Error::ShapeMismatch(format!("missing bound input for parameter `{name}`")))
		}
		OpId::Result => {
			let ins = input_slots(node, slots)?;
			Ok(ins[0].to_vec())
		}
		OpId::Constant => {
			let values: Vec<f64> = node
				.params
				.get("values")
				.and_then(Value::as_array)
				.map(|a| a.iter().filter_map(Value::as_f64).collect())
				.unwrap_or_default();
			Ok(values.into_iter().map(|v| HEType::plain(PlaintextVector::scalar(v), false)).collect())
		}
		OpId::Add | OpId::Subtract | OpId::Multiply | OpId::Minimum | OpId::Divide => {
			let ins = input_slots(node, slots)?;
			zip_binary(node.op, kctx, ins[0], ins[1])
		}
		OpId::Negative => {
			let ins = input_slots(node, slots)?;
			ins[0].par_iter().map(|a| elementwise::negate(kctx, a)).collect()
		}
		OpId::Power => {
			let ins = input_slots(node, slots)?;
			let exponent = node.params.get("exponent").and_then(Value::as_u64).unwrap_or(2);
			ins[0].par_iter().map(|a| elementwise::power(kctx, a, exponent)).collect()
		}
		OpId::Sum => {
			let ins = input_slots(node, slots)?;
			Ok(vec![reduce::sum(kctx, ins[0])?])
		}
		OpId::Dot => {
			let ins = input_slots(node, slots)?;
			let (m, k, n) = dims3(node)?;
			reduce::dot(kctx, ins[0], m, k, ins[1], n)
		}
		OpId::Convolution => {
			let ins = input_slots(node, slots)?;
			let (in_h, in_w) = dims2(node, "in_h", "in_w")?;
			let (k_h, k_w) = dims2(node, "k_h", "k_w")?;
			reduce::convolution(kctx, ins[0], in_h, in_w, ins[1], k_h, k_w)
		}
		OpId::AvgPool => {
			let ins = input_slots(node, slots)?;
			let (in_h, in_w) = dims2(node, "in_h", "in_w")?;
			let (pool_h, pool_w) = dims2(node, "pool_h", "pool_w")?;
			reduce::avg_pool(kctx, ins[0], in_h, in_w, pool_h, pool_w)
		}
		OpId::BatchNormInference => {
			let ins = input_slots(node, slots)?;
			let gamma = as_f64_array(node, "gamma")?;
			let beta = as_f64_array(node, "beta")?;
			let mean = as_f64_array(node, "mean")?;
			let variance = as_f64_array(node, "variance")?;
			let epsilon = node.params.get("epsilon").and_then(Value::as_f64).unwrap_or(1e-5);
			let affine = batch_norm::Affine::precompute(&gamma, &beta, &mean, &variance, epsilon);
			ins[0]
				.iter()
				.enumerate()
				.map(|(channel, x)| batch_norm::apply(kctx, &affine, channel % gamma.len(), x))
				.collect()
		}
		OpId::Reshape => {
			let ins = input_slots(node, slots)?;
			let old_shape = as_usize_array(node, "old_shape")?;
			let new_shape = as_usize_array(node, "new_shape")?;
			structural::reshape(ins[0], &old_shape, &new_shape)
		}
		OpId::Slice => {
			let ins = input_slots(node, slots)?;
			let shape = as_usize_array(node, "shape")?;
			let lower = as_usize_array(node, "lower")?;
			let upper = as_usize_array(node, "upper")?;
			structural::slice(ins[0], &shape, &lower, &upper)
		}
		OpId::Pad => {
			let ins = input_slots(node, slots)?;
			let shape = as_usize_array(node, "shape")?;
			let pad_below = as_usize_array(node, "pad_below")?;
			let pad_above = as_usize_array(node, "pad_above")?;
			let mode = match node.params.get("mode").and_then(Value::as_str) {
				Some("edge") => structural::PadMode::Edge,
				Some("constant") | None => {
					let value = node.params.get("pad_value").and_then(Value::as_f64).unwrap_or(0.0);
					structural::PadMode::Constant(value)
				}
				Some(other) => return Err(Error::UnsupportedOp(format!("unknown pad mode `{other}`"))),
			};
			structural::pad(ins[0], &shape, &pad_below, &pad_above, mode)
		}
		OpId::Broadcast => {
			let ins = input_slots(node, slots)?;
			let shape = as_usize_array(node, "shape")?;
			let target_shape = as_usize_array(node, "target_shape")?;
			structural::broadcast(ins[0], &shape, &target_shape)
		}
		OpId::Reverse => {
			let ins = input_slots(node, slots)?;
			let shape = as_usize_array(node, "shape")?;
			let axes = as_usize_array(node, "axes")?;
			structural::reverse(ins[0], &shape, &axes)
		}
		OpId::Concat => {
			let ins = input_slots(node, slots)?;
			let shapes = node
				.params
				.get("shapes")
				.and_then(Value::as_array)
				.ok_or_else(|| Error::ShapeMismatch("Concat requires a \"shapes\" parameter".into()))?;
			let axis = node.params.get("axis").and_then(Value::as_u64).unwrap_or(0) as usize;
			let owned_shapes: Vec<Vec<usize>> = shapes
				.iter()
				.map(|s| s.as_array().into_iter().flatten().filter_map(|v| v.as_u64()).map(|v| v as usize).collect())
				.collect();
			let pairs: Vec<(&[HEType], &[usize])> = ins.iter().zip(&owned_shapes).map(|(s, sh)| (*s, sh.as_slice())).collect();
			Ok(structural::concat(&pairs, axis)?.0)
		}
		OpId::Exp => {
			let ins = input_slots(node, slots)?;
			ins[0].par_iter().map(|a| nonlinear::exp(kctx, a)).collect()
		}
		OpId::Softmax => {
			let ins = input_slots(node, slots)?;
			nonlinear::softmax(kctx, ins[0])
		}
		OpId::Max => {
			let ins = input_slots(node, slots)?;
			Ok(vec![nonlinear::max(ins[0])?])
		}
		OpId::Relu => dispatch_relu_family(node, slots, kctx, session, "relu", None),
		OpId::BoundedRelu => {
			let bound = node.params.get("bound").and_then(Value::as_f64).unwrap_or(6.0);
			dispatch_relu_family(node, slots, kctx, session, "bounded_relu", Some(bound))
		}
		OpId::MaxPool => {
			let ins = input_slots(node, slots)?;
			let (in_h, in_w) = dims2(node, "in_h", "in_w")?;
			let (pool_h, pool_w) = dims2(node, "pool_h", "pool_w")?;
			if ins[0].iter().any(HEType::is_cipher) {
				let session = session.ok_or_else(|| {
					Error::UnsupportedOp("MaxPool on ciphertext input requires an active client session".into())
				})?;
				let windows: Vec<Vec<thorn_seal::Ciphertext>> = (0..(in_h / pool_h))
					.flat_map(|oy| (0..(in_w / pool_w)).map(move |ox| (oy, ox)))
					.map(|(oy, ox)| -> Result<Vec<thorn_seal::Ciphertext>> {
						(0..pool_h)
							.flat_map(|py| (0..pool_w).map(move |px| (py, px)))
							.map(|(py, px)| ins[0][(oy * pool_h + py) * in_w + (ox * pool_w + px)].as_cipher().cloned().ok_or_else(|| Error::ShapeMismatch("MaxPool window mixes plaintext and ciphertext cells".into())))
							.collect()
					})
					.collect::<Result<_>>()?;
				let results = offload::max_pool(kctx, session, &windows)?;
				Ok(results.into_iter().map(|c| HEType::cipher(c, false)).collect())
			} else {
				nonlinear::max_pool(ins[0], in_h, in_w, pool_h, pool_w)
			}
		}
		other => Err(Error::UnsupportedOp(format!("{other:?} has no dispatch entry"))),
	}
}

/// Dispatches `Relu`/`BoundedRelu`. Every cipher slot in the operand is
/// collected and shipped to the client in one offload batch (spec §4.5
/// steps 2-3); plaintext slots are evaluated locally and never touch the
/// wire.
fn dispatch_relu_family(
	node: &Node,
	slots: &HashMap<u64, Vec<HEType>>,
	kctx: &KernelContext,
	session: Option<&Session>,
	function: &str,
	bound: Option<f64>,
) -> Result<Vec<HEType>> {
	let ins = input_slots(node, slots)?;
	let input = ins[0];

	let cipher_positions: Vec<usize> =
		input.iter().enumerate().filter(|(_, a)| a.is_cipher()).map(|(i, _)| i).collect();

	let mut output: Vec<Option<HEType>> = vec![None; input.len()];
	for (i, a) in input.iter().enumerate() {
		if a.is_cipher() {
			continue;
		}
		output[i] = Some(match bound {
			Some(bound) => nonlinear::bounded_relu(a, bound)?,
			None => nonlinear::relu(a)?,
		});
	}

	if !cipher_positions.is_empty() {
		let session = session.ok_or_else(|| {
			Error::UnsupportedOp(format!("{function} on ciphertext input requires an active client session"))
		})?;
		warn!(function, batch_size = cipher_positions.len(), "offloading nonlinear activation to client");

		let complex_packing = input[cipher_positions[0]].complex_packing();
		let ciphers: Vec<thorn_seal::Ciphertext> =
			cipher_positions.iter().map(|&i| input[i].as_cipher().expect("filtered to cipher slots").clone()).collect();

		let results = offload::relu_or_bounded_relu(kctx, session, function, &ciphers, complex_packing)?;
		for (&i, cipher) in cipher_positions.iter().zip(results) {
			output[i] = Some(HEType::cipher(cipher, complex_packing));
		}
	}

	Ok(output.into_iter().map(|slot| slot.expect("every position filled by either branch")).collect())
}

/// Runs one binary elementwise op across every slot pair in parallel (spec
/// §5's per-kernel fork-join model over `batched_element_count`).
fn zip_binary(op: OpId, kctx: &KernelContext, a: &[HEType], b: &[HEType]) -> Result<Vec<HEType>> {
	if a.len() == b.len() {
		a.par_iter().zip(b.par_iter()).map(|(x, y)| elementwise::binary(op, kctx, x, y)).collect()
	} else if b.len() == 1 {
		a.par_iter().map(|x| elementwise::binary(op, kctx, x, &b[0])).collect()
	} else if a.len() == 1 {
		b.par_iter().map(|y| elementwise::binary(op, kctx, &a[0], y)).collect()
	} else {
		Err(Error::ShapeMismatch(format!("cannot broadcast operands of length {} and {}", a.len(), b.len())))
	}
}

fn dims2(node: &Node, a: &str, b: &str) -> Result<(usize, usize)> {
	let get = |key: &str| -> Result<usize> {
		node.params
			.get(key)
			.and_then(Value::as_u64)
			.map(|v| v as usize)
			.ok_or_else(|| Error::ShapeMismatch(format!("node {} is missing \"{key}\"", node.id)))
	};
	Ok((get(a)?, get(b)?))
}

fn dims3(node: &Node) -> Result<(usize, usize, usize)> {
	let get = |key: &str| -> Result<usize> {
		node.params
			.get(key)
			.and_then(Value::as_u64)
			.map(|v| v as usize)
			.ok_or_else(|| Error::ShapeMismatch(format!("node {} is missing \"{key}\"", node.id)))
	};
	Ok((get("m")?, get("k")?, get("n")?))
}

fn as_usize_array(node: &Node, key: &str) -> Result<Vec<usize>> {
	node.params
		.get(key)
		.and_then(Value::as_array)
		.map(|a| a.iter().filter_map(Value::as_u64).map(|v| v as usize).collect())
		.ok_or_else(|| Error::ShapeMismatch(format!("node {} is missing \"{key}\"", node.id)))
}

fn as_f64_array(node: &Node, key: &str) -> Result<Vec<f64>> {
	node.params
		.get(key)
		.and_then(Value::as_array)
		.map(|a| a.iter().filter_map(Value::as_f64).collect())
		.ok_or_else(|| Error::ShapeMismatch(format!("node {} is missing \"{key}\"", node.id)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn free_dead_inputs_keeps_graph_outputs_alive() {
		let graph = Graph {
			nodes: vec![
				Node { id: 0, op: OpId::Parameter, inputs: vec![], params: serde_json::json!({"name": "x"}) },
				Node { id: 1, op: OpId::Negative, inputs: vec![0], params: Value::Null },
			],
			output_ids: vec![0],
		};
		let mut slots = HashMap::new();
		slots.insert(0u64, vec![HEType::plain(PlaintextVector::scalar(1.0), false)]);
		free_dead_inputs(&graph.nodes[1], &graph, &mut slots);
		assert!(slots.contains_key(&0));
	}

	#[test]
	fn node_name_requires_name_parameter() {
		let node = Node { id: 0, op: OpId::Parameter, inputs: vec![], params: Value::Null };
		assert!(matches!(node_name(&node), Err(Error::ShapeMismatch(_))));
	}
}
