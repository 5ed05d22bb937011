//! Binary and unary elementwise kernels (spec §4.3's scalar dispatch table
//! for `add, multiply, subtract, minimum, divide, negate, power`).
//!
//! The CKKS primitive adapter (spec §4.1) exposes `add`/`multiply`/`negate`/
//! `exponentiate` and their plaintext variants, but nothing for a
//! ciphertext-involving `divide` or `minimum`: CKKS has no native
//! reciprocal or comparison operation. `divide` is therefore only
//! expressible when the divisor is plaintext (as a reciprocal multiply);
//! `minimum` is only expressible when both operands are plaintext. Either
//! op against an encrypted operand of the wrong shape for that path returns
//! [`Error::UnsupportedOp`] rather than pretending a primitive exists.

use thorn_crypto::{modulus_chain, HEType, PlaintextVector};
use thorn_seal::Evaluator;

use crate::error::{Error, Result};
use crate::kernel::context::KernelContext;
use crate::op::OpId;

/// The error type [`HEType::dispatch_binary`]'s closures must return, since
/// the dispatch lives in `thorn_crypto`.
type CryptoResult<T> = thorn_crypto::Result<T>;

fn matched_ciphers(
	kctx: &KernelContext,
	a: &thorn_seal::Ciphertext,
	b: &thorn_seal::Ciphertext,
) -> CryptoResult<(thorn_seal::Ciphertext, thorn_seal::Ciphertext)> {
	let mut a = a.clone();
	let mut b = b.clone();
	modulus_chain::match_modulus_and_scale_inplace(kctx.context, kctx.evaluator, &mut a, &mut b)?;
	Ok((a, b))
}

fn encode_at(
	kctx: &KernelContext,
	cipher: &thorn_seal::Ciphertext,
	values: &[f64],
) -> CryptoResult<thorn_seal::Plaintext> {
	Ok(kctx.encoder.encode_f64_at(values, &cipher.get_parms_id()?, cipher.get_scale()?)?)
}

/// Dispatches one binary elementwise op across the cipher/plain 2x2 tag
/// cross-product, applying the identity short-circuits and rescale rule
/// from spec §4.3.
pub fn binary(op: OpId, kctx: &KernelContext, a: &HEType, b: &HEType) -> Result<HEType> {
	match op {
		OpId::Add => additive(kctx, a, b, false),
		OpId::Subtract => additive(kctx, a, b, true),
		OpId::Multiply => multiplicative(kctx, a, b),
		OpId::Minimum => minimum(a, b),
		OpId::Divide => divide(kctx, a, b),
		other => unreachable!("{other:?} is not a binary elementwise op"),
	}
}

/// Applies [`OpId::Negative`].
pub fn negate(kctx: &KernelContext, a: &HEType) -> Result<HEType> {
	match a.as_cipher() {
		Some(cipher) => Ok(HEType::cipher(kctx.evaluator.negate(cipher)?, a.complex_packing())),
		None => {
			let plain = a.as_plain().expect("HEType is plain or cipher");
			Ok(HEType::plain(PlaintextVector(plain.0.iter().map(|v| -v).collect()), a.complex_packing()))
		}
	}
}

/// Applies [`OpId::Power`], raising `a` to `exponent` via repeated
/// relinearized squaring (`thorn_seal::Evaluator::exponentiate`) on
/// ciphertext operands, or host `f64::powi` on plaintext ones.
pub fn power(kctx: &KernelContext, a: &HEType, exponent: u64) -> Result<HEType> {
	match a.as_cipher() {
		Some(cipher) => {
			let mut raised = kctx.evaluator.exponentiate(cipher, exponent, kctx.relin_keys)?;
			modulus_chain::rescale(kctx.evaluator, &mut raised)?;
			Ok(HEType::cipher(raised, a.complex_packing()))
		}
		None => {
			let plain = a.as_plain().expect("HEType is plain or cipher");
			Ok(HEType::plain(
				PlaintextVector(plain.0.iter().map(|v| v.powi(exponent as i32)).collect()),
				a.complex_packing(),
			))
		}
	}
}

fn additive(kctx: &KernelContext, a: &HEType, b: &HEType, subtract: bool) -> Result<HEType> {
	let out = a.dispatch_binary(
		b,
		|x, y| {
			let (mut x, y) = matched_ciphers(kctx, x, y)?;
			if subtract {
				kctx.evaluator.sub_inplace(&mut x, &y)?;
			} else {
				kctx.evaluator.add_inplace(&mut x, &y)?;
			}
			Ok(x)
		},
		|x, y| cipher_plain_additive(kctx, x, y, subtract, false),
		|x, y| cipher_plain_additive(kctx, y, x, subtract, true),
		|x, y| {
			Ok(PlaintextVector(broadcast_zip(&x.0, &y.0, |l, r| if subtract { l - r } else { l + r })))
		},
	)?;
	Ok(out)
}

fn cipher_plain_additive(
	kctx: &KernelContext,
	cipher: &thorn_seal::Ciphertext,
	plain: &PlaintextVector,
	subtract: bool,
	flip_sign: bool,
) -> CryptoResult<thorn_seal::Ciphertext> {
	if plain.is_additive_identity() {
		return Ok(cipher.clone());
	}

	let values: Vec<f64> = if flip_sign && subtract {
		plain.0.iter().map(|v| -v).collect()
	} else {
		plain.0.clone()
	};
	let encoded = encode_at(kctx, cipher, &values)?;

	let result = if subtract && !flip_sign {
		kctx.evaluator.sub_plain(cipher, &encoded)?
	} else if subtract && flip_sign {
		// plain - cipher == -(cipher - plain); `values` above already negated plain,
		// so add_plain(cipher, -plain) gives cipher - plain, then negate.
		let mut out = kctx.evaluator.add_plain(cipher, &encoded)?;
		kctx.evaluator.negate_inplace(&mut out)?;
		out
	} else {
		kctx.evaluator.add_plain(cipher, &encoded)?
	};

	Ok(result)
}

fn multiplicative(kctx: &KernelContext, a: &HEType, b: &HEType) -> Result<HEType> {
	let out = a.dispatch_binary(
		b,
		|x, y| {
			let (mut x, y) = matched_ciphers(kctx, x, y)?;
			kctx.evaluator.multiply_inplace(&mut x, &y)?;
			kctx.evaluator.relinearize_inplace(&mut x, kctx.relin_keys)?;
			modulus_chain::rescale(kctx.evaluator, &mut x)?;
			Ok(x)
		},
		|x, y| cipher_plain_multiply(kctx, x, y),
		|x, y| cipher_plain_multiply(kctx, y, x),
		|x, y| Ok(PlaintextVector(broadcast_zip(&x.0, &y.0, |l, r| l * r))),
	)?;
	Ok(out)
}

fn cipher_plain_multiply(
	kctx: &KernelContext,
	cipher: &thorn_seal::Ciphertext,
	plain: &PlaintextVector,
) -> CryptoResult<thorn_seal::Ciphertext> {
	if plain.is_multiplicative_identity() {
		return Ok(cipher.clone());
	}
	if plain.is_negation() {
		return Ok(kctx.evaluator.negate(cipher)?);
	}

	let encoded = encode_at(kctx, cipher, &plain.0)?;
	let mut out = kctx.evaluator.multiply_plain(cipher, &encoded)?;
	modulus_chain::rescale(kctx.evaluator, &mut out)?;
	Ok(out)
}

fn minimum(a: &HEType, b: &HEType) -> Result<HEType> {
	match (a.as_plain(), b.as_plain()) {
		(Some(x), Some(y)) => Ok(HEType::plain(
			PlaintextVector(broadcast_zip(&x.0, &y.0, f64::min)),
			a.complex_packing(),
		)),
		_ => Err(Error::UnsupportedOp(
			"Minimum has no CKKS-native comparison; requires client-aided offload".into(),
		)),
	}
}

fn divide(kctx: &KernelContext, a: &HEType, b: &HEType) -> Result<HEType> {
	match (a.as_cipher(), b.as_plain()) {
		(Some(cipher), Some(plain)) => {
			let reciprocal = PlaintextVector(plain.0.iter().map(|v| 1.0 / v).collect());
			let out = cipher_plain_multiply(kctx, cipher, &reciprocal)?;
			Ok(HEType::cipher(out, a.complex_packing()))
		}
		(None, None) => {
			let x = a.as_plain().unwrap();
			let y = b.as_plain().unwrap();
			Ok(HEType::plain(PlaintextVector(broadcast_zip(&x.0, &y.0, |l, r| l / r)), a.complex_packing()))
		}
		_ => Err(Error::UnsupportedOp("Divide by a ciphertext is not expressible in CKKS".into())),
	}
}

/// Size-1 operands broadcast over the other; otherwise elementwise over
/// `min(sizes)` (spec §4.3).
fn broadcast_zip(x: &[f64], y: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
	if x.len() == 1 {
		y.iter().map(|r| f(x[0], *r)).collect()
	} else if y.len() == 1 {
		x.iter().map(|l| f(l, y[0])).collect()
	} else {
		x.iter().zip(y.iter()).map(|(l, r)| f(*l, *r)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn broadcast_zip_scalar_over_vector() {
		assert_eq!(broadcast_zip(&[2.0], &[1.0, 2.0, 3.0], |l, r| l * r), vec![2.0, 4.0, 6.0]);
	}

	#[test]
	fn minimum_computes_elementwise_min_for_plaintext_operands() {
		let a = HEType::plain(PlaintextVector(vec![1.0, 5.0]), false);
		let b = HEType::plain(PlaintextVector(vec![3.0, 2.0]), false);
		let result = minimum(&a, &b).unwrap();
		assert_eq!(result.into_plain().unwrap().0, vec![1.0, 2.0]);
	}
}
