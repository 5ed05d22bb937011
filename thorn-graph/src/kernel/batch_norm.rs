//! `BatchNormInference` (spec §4.3): folds `gamma, beta, mean, variance,
//! epsilon` into a single precomputed affine `scale * x + bias` per
//! channel, so the encrypted path costs one multiply-plain and one
//! add-plain instead of a subtraction, a division and a square root.

use thorn_crypto::{HEType, PlaintextVector};

use crate::error::Result;
use crate::kernel::context::KernelContext;
use crate::kernel::elementwise;
use crate::op::OpId;

/// Per-channel affine parameters derived once from `gamma/beta/mean/variance`.
pub struct Affine {
	scale: Vec<f64>,
	bias: Vec<f64>,
}

impl Affine {
	/// Precomputes `scale = gamma / sqrt(variance + epsilon)` and
	/// `bias = beta - mean * scale` for every channel.
	pub fn precompute(gamma: &[f64], beta: &[f64], mean: &[f64], variance: &[f64], epsilon: f64) -> Affine {
		let scale: Vec<f64> = gamma.iter().zip(variance).map(|(g, v)| g / (v + epsilon).sqrt()).collect();
		let bias: Vec<f64> = beta
			.iter()
			.zip(&scale)
			.zip(mean)
			.map(|((b, s), m)| b - m * s)
			.collect();
		Affine { scale, bias }
	}
}

/// Applies the precomputed affine form to one channel's worth of
/// elements, `channel` indexing into [`Affine`]'s per-channel vectors.
pub fn apply(kctx: &KernelContext, affine: &Affine, channel: usize, x: &HEType) -> Result<HEType> {
	let complex_packing = x.complex_packing();
	let scale = HEType::plain(PlaintextVector::scalar(affine.scale[channel]), complex_packing);
	let bias = HEType::plain(PlaintextVector::scalar(affine.bias[channel]), complex_packing);

	let scaled = elementwise::binary(OpId::Multiply, kctx, x, &scale)?;
	elementwise::binary(OpId::Add, kctx, &scaled, &bias)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn precompute_matches_the_naive_normalization_formula() {
		let affine = Affine::precompute(&[2.0], &[1.0], &[3.0], &[4.0], 0.0);
		let naive = 2.0 / 4.0f64.sqrt();
		assert!((affine.scale[0] - naive).abs() < 1e-12);
		assert!((affine.bias[0] - (1.0 - 3.0 * naive)).abs() < 1e-12);
	}
}
