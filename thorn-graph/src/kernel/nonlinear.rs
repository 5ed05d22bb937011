//! Non-linear activations (spec §4.3). `Relu`, `BoundedRelu` and `MaxPool`
//! have no CKKS-expressible form at all and are handled by client-aided
//! offload (see [`crate::offload`]) whenever their operand is encrypted;
//! the functions here only cover their plaintext path. `Exp`, `Power` and
//! `Softmax` instead run as a local polynomial approximation even on
//! encrypted operands, at the cost of a logged warning: the approximation
//! error is unbounded compared to an exact activation, and `Softmax`'s
//! normalization step cannot run on an encrypted sum (CKKS has no
//! ciphertext/ciphertext divide), so only the unnormalized numerators are
//! returned in that case.

use tracing::warn;

use thorn_crypto::{HEType, PlaintextVector};

use crate::error::Result;
use crate::kernel::context::KernelContext;
use crate::kernel::elementwise;
use crate::kernel::reduce;
use crate::op::OpId;

fn warn_if_encrypted(op: OpId, a: &HEType) {
	if a.is_cipher() {
		warn!(?op, "approximating a non-linear activation on an encrypted operand; precision is unbounded");
	}
}

/// Third-order Taylor approximation of `e^x`, evaluated with the same
/// `add`/`multiply` primitives every other kernel uses so it composes with
/// the rest of the dispatch table (including ciphertext operands).
pub fn exp(kctx: &KernelContext, a: &HEType) -> Result<HEType> {
	warn_if_encrypted(OpId::Exp, a);

	let one = HEType::plain(PlaintextVector::scalar(1.0), a.complex_packing());
	let half = HEType::plain(PlaintextVector::scalar(0.5), a.complex_packing());
	let sixth = HEType::plain(PlaintextVector::scalar(1.0 / 6.0), a.complex_packing());

	let x2 = elementwise::binary(OpId::Multiply, kctx, a, a)?;
	let x3 = elementwise::binary(OpId::Multiply, kctx, &x2, a)?;

	let term2 = elementwise::binary(OpId::Multiply, kctx, &x2, &half)?;
	let term3 = elementwise::binary(OpId::Multiply, kctx, &x3, &sixth)?;

	let sum = elementwise::binary(OpId::Add, kctx, &one, a)?;
	let sum = elementwise::binary(OpId::Add, kctx, &sum, &term2)?;
	elementwise::binary(OpId::Add, kctx, &sum, &term3)
}

/// `Softmax` over `inputs`, treated as one batch axis: `exp(x_i) /
/// sum(exp(x))` when every input is plaintext, else the unnormalized
/// numerators (see module docs).
pub fn softmax(kctx: &KernelContext, inputs: &[HEType]) -> Result<Vec<HEType>> {
	let numerators: Result<Vec<HEType>> = inputs.iter().map(|x| exp(kctx, x)).collect();
	let numerators = numerators?;

	if inputs.iter().any(HEType::is_cipher) {
		warn!("softmax normalization skipped: CKKS has no ciphertext divisor");
		return Ok(numerators);
	}

	let total: f64 = numerators.iter().map(|n| n.as_plain().expect("checked all-plaintext above").0[0]).sum();
	Ok(numerators
		.into_iter()
		.map(|n| HEType::plain(PlaintextVector::scalar(n.as_plain().unwrap().0[0] / total), n.complex_packing()))
		.collect())
}

/// Plaintext-only `Relu`: `max(x, 0)`. Ciphertext operands are the
/// executor's responsibility via client-aided offload.
pub fn relu(a: &HEType) -> Result<HEType> {
	let plain = a.as_plain().expect("cipher Relu must be routed through client offload");
	Ok(HEType::plain(PlaintextVector(plain.0.iter().map(|v| v.max(0.0)).collect()), a.complex_packing()))
}

/// Plaintext-only `BoundedRelu`: `clamp(x, 0, bound)`.
pub fn bounded_relu(a: &HEType, bound: f64) -> Result<HEType> {
	let plain = a.as_plain().expect("cipher BoundedRelu must be routed through client offload");
	Ok(HEType::plain(
		PlaintextVector(plain.0.iter().map(|v| v.clamp(0.0, bound)).collect()),
		a.complex_packing(),
	))
}

/// `Max` over `inputs`: a plaintext reduction, warning if any input is
/// encrypted (CKKS has no native comparison; see [`elementwise::minimum`]'s
/// companion rationale).
pub fn max(inputs: &[HEType]) -> Result<HEType> {
	for input in inputs {
		warn_if_encrypted(OpId::Max, input);
	}
	let complex_packing = inputs.first().map(HEType::complex_packing).unwrap_or(false);
	let mut best = f64::NEG_INFINITY;
	for input in inputs {
		let plain = input.as_plain().expect("Max requires plaintext operands");
		best = best.max(plain.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
	}
	Ok(HEType::plain(PlaintextVector::scalar(best), complex_packing))
}

/// Plaintext-only `MaxPool` over non-overlapping `pool_h x pool_w`
/// windows. Ciphertext operands are the executor's responsibility via
/// client-aided offload (the per-cell maximize-list variant).
pub fn max_pool(input: &[HEType], in_h: usize, in_w: usize, pool_h: usize, pool_w: usize) -> Result<Vec<HEType>> {
	let out_h = in_h / pool_h;
	let out_w = in_w / pool_w;
	let mut out = Vec::with_capacity(out_h * out_w);

	for oy in 0..out_h {
		for ox in 0..out_w {
			let window: Vec<HEType> = (0..pool_h)
				.flat_map(|py| (0..pool_w).map(move |px| (py, px)))
				.map(|(py, px)| input[(oy * pool_h + py) * in_w + (ox * pool_w + px)].clone())
				.collect();
			out.push(max(&window)?);
		}
	}
	Ok(out)
}

/// `Sum` is an alias the executor dispatches through [`reduce::sum`]
/// directly; re-exported here so `OpId::Sum` callers needing the
/// non-linear module's imports don't pull in `kernel::reduce` separately.
pub use reduce::sum;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn relu_clamps_negatives() {
		let a = HEType::plain(PlaintextVector(vec![-1.0, 2.0]), false);
		let out = relu(&a).unwrap();
		assert_eq!(out.into_plain().unwrap().0, vec![0.0, 2.0]);
	}

	#[test]
	fn bounded_relu_clamps_both_sides() {
		let a = HEType::plain(PlaintextVector(vec![-1.0, 5.0, 10.0]), false);
		let out = bounded_relu(&a, 6.0).unwrap();
		assert_eq!(out.into_plain().unwrap().0, vec![0.0, 5.0, 6.0]);
	}

	#[test]
	fn max_picks_largest_plaintext_value() {
		let a = HEType::plain(PlaintextVector::scalar(1.0), false);
		let b = HEType::plain(PlaintextVector::scalar(9.0), false);
		let out = max(&[a, b]).unwrap();
		assert_eq!(out.into_plain().unwrap().0, vec![9.0]);
	}
}
