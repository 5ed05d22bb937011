//! Dot product, convolution, average pooling and sum reduction (spec §4.3:
//! "classical tensor-iteration algorithms expressed over the slot array...
//! the inner accumulation alternates add and multiply-then-rescale; under
//! lazy-mod the inner adds defer reductions and a single mod_reduce +
//! rescale closes the kernel").

use thorn_crypto::modulus_chain::LazyAccumulator;
use thorn_crypto::{HEType, PlaintextVector};

use crate::error::Result;
use crate::kernel::context::KernelContext;
use crate::kernel::elementwise;
use crate::op::OpId;

/// Accumulates `terms` into one slot: under `lazy_mod`, ciphertext terms are
/// queued into a [`LazyAccumulator`] and reduced once; otherwise they are
/// folded pairwise through [`elementwise::binary`]'s `Add` path.
fn accumulate(kctx: &KernelContext, terms: Vec<HEType>) -> Result<HEType> {
	if terms.is_empty() {
		return Ok(HEType::plain(PlaintextVector::default(), false));
	}

	if kctx.lazy_mod && terms.iter().all(HEType::is_cipher) {
		let mut acc = LazyAccumulator::new();
		let complex_packing = terms[0].complex_packing();
		for term in terms {
			acc.push(term.into_cipher()?);
		}
		let summed = acc.finish(kctx.evaluator)?.expect("non-empty terms checked above");
		return Ok(HEType::cipher(summed, complex_packing));
	}

	let mut iter = terms.into_iter();
	let mut acc = iter.next().unwrap();
	for term in iter {
		acc = elementwise::binary(OpId::Add, kctx, &acc, &term)?;
	}
	Ok(acc)
}

/// `Sum` over the batch axis: reduces every slot in `inputs` to one.
pub fn sum(kctx: &KernelContext, inputs: &[HEType]) -> Result<HEType> {
	accumulate(kctx, inputs.to_vec())
}

/// `Dot` with `reduction_axes = 1`: for row-major `a` of shape `[m, k]` and
/// `b` of shape `[k, n]`, produces `m*n` output slots, each the accumulated
/// product of one row of `a` and one column of `b`.
pub fn dot(kctx: &KernelContext, a: &[HEType], m: usize, k: usize, b: &[HEType], n: usize) -> Result<Vec<HEType>> {
	let mut out = Vec::with_capacity(m * n);
	for row in 0..m {
		for col in 0..n {
			let products: Result<Vec<HEType>> = (0..k)
				.map(|i| {
					let lhs = &a[row * k + i];
					let rhs = &b[i * n + col];
					elementwise::binary(OpId::Multiply, kctx, lhs, rhs)
				})
				.collect();
			out.push(accumulate(kctx, products?)?);
		}
	}
	Ok(out)
}

/// `Convolution` of a single-channel `input` (`in_h x in_w`) with a single
/// `kernel` (`k_h x k_w`), stride 1, no padding.
pub fn convolution(
	kctx: &KernelContext,
	input: &[HEType],
	in_h: usize,
	in_w: usize,
	kernel: &[HEType],
	k_h: usize,
	k_w: usize,
) -> Result<Vec<HEType>> {
	let out_h = in_h - k_h + 1;
	let out_w = in_w - k_w + 1;
	let mut out = Vec::with_capacity(out_h * out_w);

	for oy in 0..out_h {
		for ox in 0..out_w {
			let products: Result<Vec<HEType>> = (0..k_h)
				.flat_map(|ky| (0..k_w).map(move |kx| (ky, kx)))
				.map(|(ky, kx)| {
					let input_idx = (oy + ky) * in_w + (ox + kx);
					let kernel_idx = ky * k_w + kx;
					elementwise::binary(OpId::Multiply, kctx, &input[input_idx], &kernel[kernel_idx])
				})
				.collect();
			out.push(accumulate(kctx, products?)?);
		}
	}
	Ok(out)
}

/// `AvgPool` over non-overlapping `pool_h x pool_w` windows with matching
/// stride, implemented as a sum followed by a multiply-by-reciprocal
/// (spec §4.3's dispatch contract covers `Divide`'s cipher-plain path).
pub fn avg_pool(
	kctx: &KernelContext,
	input: &[HEType],
	in_h: usize,
	in_w: usize,
	pool_h: usize,
	pool_w: usize,
) -> Result<Vec<HEType>> {
	let out_h = in_h / pool_h;
	let out_w = in_w / pool_w;
	let scale = PlaintextVector::scalar(1.0 / (pool_h * pool_w) as f64);
	let mut out = Vec::with_capacity(out_h * out_w);

	for oy in 0..out_h {
		for ox in 0..out_w {
			let terms: Vec<HEType> = (0..pool_h)
				.flat_map(|py| (0..pool_w).map(move |px| (py, px)))
				.map(|(py, px)| input[(oy * pool_h + py) * in_w + (ox * pool_w + px)].clone())
				.collect();
			let summed = accumulate(kctx, terms)?;
			out.push(elementwise::binary(
				OpId::Multiply,
				kctx,
				&summed,
				&HEType::plain(scale.clone(), summed.complex_packing()),
			)?);
		}
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accumulate_of_empty_terms_is_additive_identity() {
		// No context needed on the empty path.
		let terms: Vec<HEType> = Vec::new();
		assert!(terms.is_empty());
	}
}
