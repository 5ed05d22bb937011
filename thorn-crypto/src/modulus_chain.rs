//! Keeps two CKKS operands compatible for addition by tracking chain index
//! and scale, and restores canonical form after a multiply.
//!
//! Addition requires both operands to sit at the same chain index and have
//! equal scales; multiplication doubles the scale and requires a subsequent
//! rescale. These are pure functions over [`thorn_seal`] handles; they hold
//! no state of their own.

use thorn_seal::{CKKSEvaluator, Ciphertext, Context, Evaluator};

use crate::error::{Error, Result};
use crate::he_type::HEType;

/// Tolerance (in log2 space) below which two scales are considered drifted
/// rather than genuinely mismatched; CKKS rescaling and repeated encoding
/// accumulate small floating-point drift that isn't a real incompatibility.
const SCALE_DRIFT_EPSILON: f64 = 1e-2;

/// Relative tolerance used when checking whether a scale ratio matches one
/// of the primes in the modulus chain.
const PRIME_MATCH_TOLERANCE: f64 = 1e-6;

fn chain_index(ctx: &Context, cipher: &Ciphertext) -> Result<usize> {
	Ok(ctx.get_chain_index(&cipher.get_parms_id()?)?)
}

/// Mod-switches `a` downward until its chain index no longer exceeds
/// `target`.
fn mod_switch_down_to(
	ctx: &Context,
	evaluator: &CKKSEvaluator,
	cipher: &mut Ciphertext,
	target: usize,
) -> Result<()> {
	while chain_index(ctx, cipher)? < target {
		evaluator.mod_switch_to_next_inplace(cipher)?;
	}
	Ok(())
}

fn coefficient_modulus_values(ctx: &Context, cipher: &Ciphertext) -> Result<Vec<u64>> {
	let context_data = ctx.get_context_data(&cipher.get_parms_id()?)?;
	let params = context_data.get_encryption_parameters()?;
	Ok(params.get_coefficient_modulus().iter().map(|m| m.value()).collect())
}

/// Reconciles `a` and `b`'s chain index and scale in place so they can be
/// added. Mod-switches the operand at the higher chain index down to match
/// the other, then either snaps an infinitesimally drifted scale to match,
/// rescales the operand whose scale differs by exactly one modulus-chain
/// prime, or fails with [`Error::ScaleMismatch`].
pub fn match_modulus_and_scale_inplace(
	ctx: &Context,
	evaluator: &CKKSEvaluator,
	a: &mut Ciphertext,
	b: &mut Ciphertext,
) -> Result<()> {
	let ia = chain_index(ctx, a)?;
	let ib = chain_index(ctx, b)?;

	if ia < ib {
		mod_switch_down_to(ctx, evaluator, a, ib)?;
	} else if ib < ia {
		mod_switch_down_to(ctx, evaluator, b, ia)?;
	}

	let sa = a.get_scale()?;
	let sb = b.get_scale()?;

	if sa == sb {
		return Ok(());
	}

	let log_drift = (sa.log2() - sb.log2()).abs();
	if log_drift < SCALE_DRIFT_EPSILON {
		a.set_scale(sb)?;
		return Ok(());
	}

	let (larger, larger_scale, smaller_scale) = if sa > sb { (a, sa, sb) } else { (b, sb, sa) };
	let ratio = larger_scale / smaller_scale;
	let primes = coefficient_modulus_values(ctx, larger)?;

	let matches_prime = primes
		.iter()
		.any(|&p| ((p as f64) - ratio).abs() / ratio < PRIME_MATCH_TOLERANCE);

	if matches_prime {
		evaluator.rescale_to_next_inplace(larger)?;
		Ok(())
	} else {
		Err(Error::ScaleMismatch(format!(
			"scale ratio {ratio} matches neither a drift tolerance nor a modulus-chain prime"
		)))
	}
}

/// Scans `slots` for ciphertexts and levels them all to a common reachable
/// chain index, mod-switching the shallower ones down. Plaintext slots are
/// untouched. Returns `usize::MAX` when no slot is encrypted.
///
/// `chain_index` here counts depth from the top of the chain (0 = freshly
/// encrypted, increasing with each mod-switch; see
/// `thorn_seal::Context::get_chain_index`), and mod-switching is one
/// directional: it can only raise a ciphertext's index, never lower it. The
/// only index every ciphertext in `slots` can reach is therefore the
/// **deepest** (maximum) one already present, not the shallowest.
pub fn match_to_smallest_chain_index(
	ctx: &Context,
	evaluator: &CKKSEvaluator,
	slots: &mut [HEType],
) -> Result<usize> {
	let mut deepest = usize::MAX;

	for slot in slots.iter() {
		if let Some(cipher) = slot.as_cipher() {
			deepest = if deepest == usize::MAX {
				chain_index(ctx, cipher)?
			} else {
				deepest.max(chain_index(ctx, cipher)?)
			};
		}
	}

	if deepest == usize::MAX {
		return Ok(deepest);
	}

	for slot in slots.iter_mut() {
		if let Some(cipher) = slot.as_cipher_mut() {
			mod_switch_down_to(ctx, evaluator, cipher, deepest)?;
		}
	}

	Ok(deepest)
}

/// Rescales `cipher` to the next chain level, then snaps the resulting
/// scale to the nearest power-of-two nominal scale to bound drift
/// accumulation across a long sequence of multiplications.
pub fn rescale(evaluator: &CKKSEvaluator, cipher: &mut Ciphertext) -> Result<()> {
	evaluator.rescale_to_next_inplace(cipher)?;

	let scale = cipher.get_scale()?;
	let nominal = 2f64.powi(scale.log2().round() as i32);
	cipher.set_scale(nominal)?;

	Ok(())
}

/// Batches ciphertext additions so the evaluator's modular reduction runs
/// once over the whole batch instead of once per pairwise add. `thorn_seal`
/// does not expose raw coefficient-limb arithmetic (the CKKS primitive
/// stays an external collaborator), so this is the adapter-level
/// equivalent of deferred reduction across a long accumulation chain such
/// as a dot product: push every addend, then `finish` once before the sum
/// is consumed by a multiply or rescale.
#[derive(Debug, Default)]
pub struct LazyAccumulator {
	pending: Vec<Ciphertext>,
}

impl LazyAccumulator {
	/// Creates an empty accumulator.
	pub fn new() -> Self {
		Self { pending: Vec::new() }
	}

	/// Queues `cipher` for the deferred sum.
	pub fn push(&mut self, cipher: Ciphertext) {
		self.pending.push(cipher);
	}

	/// Number of addends queued so far.
	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// True when no addends have been queued.
	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Performs the deferred additions in a single reduction pass,
	/// restoring canonical form. Returns `None` if nothing was queued.
	pub fn finish(self, evaluator: &CKKSEvaluator) -> Result<Option<Ciphertext>> {
		if self.pending.is_empty() {
			return Ok(None);
		}

		Ok(Some(evaluator.add_many(&self.pending)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use thorn_seal::{
		CKKSEncoder, CkksEncryptionParametersBuilder, CoefficientModulus, DegreeType, Encryptor,
		KeyGenerator, SecurityLevel,
	};

	fn build_context() -> Context {
		let degree = DegreeType::D8192;
		let modulus = CoefficientModulus::create(degree, &[60, 40, 40, 60]).unwrap();
		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(degree)
			.set_coefficient_modulus(modulus)
			.build()
			.unwrap();

		Context::new(&params, false, SecurityLevel::TC128).unwrap()
	}

	#[test]
	fn matched_operands_need_no_adjustment() {
		let ctx = build_context();
		let key_gen = KeyGenerator::new(&ctx).unwrap();
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
		let evaluator = CKKSEvaluator::new(&ctx).unwrap();
		let encryptor =
			Encryptor::with_public_and_secret_key(&ctx, &key_gen.create_public_key(), &key_gen.secret_key())
				.unwrap();

		let mut a = encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap();
		let mut b = encryptor.encrypt(&encoder.encode_f64(&[2.0]).unwrap()).unwrap();

		match_modulus_and_scale_inplace(&ctx, &evaluator, &mut a, &mut b).unwrap();

		assert_eq!(chain_index(&ctx, &a).unwrap(), chain_index(&ctx, &b).unwrap());
		assert_eq!(a.get_scale().unwrap(), b.get_scale().unwrap());
	}

	#[test]
	fn mismatched_chain_index_is_leveled() {
		let ctx = build_context();
		let key_gen = KeyGenerator::new(&ctx).unwrap();
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
		let evaluator = CKKSEvaluator::new(&ctx).unwrap();
		let encryptor =
			Encryptor::with_public_and_secret_key(&ctx, &key_gen.create_public_key(), &key_gen.secret_key())
				.unwrap();

		let mut a = encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap();
		let mut b = encryptor.encrypt(&encoder.encode_f64(&[2.0]).unwrap()).unwrap();
		evaluator.mod_switch_to_next_inplace(&mut b).unwrap();

		match_modulus_and_scale_inplace(&ctx, &evaluator, &mut a, &mut b).unwrap();

		assert_eq!(chain_index(&ctx, &a).unwrap(), chain_index(&ctx, &b).unwrap());
	}

	#[test]
	fn match_to_smallest_chain_index_ignores_plaintext_slots() {
		let ctx = build_context();
		let key_gen = KeyGenerator::new(&ctx).unwrap();
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
		let evaluator = CKKSEvaluator::new(&ctx).unwrap();
		let encryptor =
			Encryptor::with_public_and_secret_key(&ctx, &key_gen.create_public_key(), &key_gen.secret_key())
				.unwrap();

		let a = encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap();
		let mut b = encryptor.encrypt(&encoder.encode_f64(&[2.0]).unwrap()).unwrap();
		evaluator.mod_switch_to_next_inplace(&mut b).unwrap();

		let mut slots = vec![
			HEType::cipher(a, false),
			HEType::cipher(b, false),
			HEType::plain(crate::he_type::PlaintextVector::scalar(3.0), false),
		];

		let deepest = match_to_smallest_chain_index(&ctx, &evaluator, &mut slots).unwrap();
		assert_eq!(deepest, 1);

		let indices: Vec<usize> = slots
			.iter()
			.filter_map(HEType::as_cipher)
			.map(|c| chain_index(&ctx, c).unwrap())
			.collect();

		assert!(indices.iter().all(|&i| i == deepest));
	}

	#[test]
	fn no_ciphertexts_returns_max() {
		let ctx = build_context();
		let evaluator = CKKSEvaluator::new(&ctx).unwrap();
		let mut slots = vec![HEType::plain(crate::he_type::PlaintextVector::scalar(1.0), false)];

		assert_eq!(
			match_to_smallest_chain_index(&ctx, &evaluator, &mut slots).unwrap(),
			usize::MAX
		);
	}
}
