//! Per-element tagged slot: either an encoded plaintext vector or a CKKS
//! ciphertext, carrying a `complex_packing` flag that both operands of any
//! binary kernel must agree on.

use thorn_seal::Ciphertext;

use crate::error::{Error, Result};

/// An ordered sequence of real doubles, length `0..slot_count`. An empty
/// vector is the additive identity; a length-1 vector broadcasts as a
/// scalar when combined with a larger operand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaintextVector(pub Vec<f64>);

impl PlaintextVector {
	/// Wraps a single value as a length-1 scalar vector.
	pub fn scalar(value: f64) -> Self {
		PlaintextVector(vec![value])
	}

	/// True for the empty vector or `[0.0]`, both of which are the additive
	/// identity under the binary-elementwise dispatch contract.
	pub fn is_additive_identity(&self) -> bool {
		self.0.is_empty() || self.0 == [0.0]
	}

	/// True for `[1.0]`, the multiplicative identity.
	pub fn is_multiplicative_identity(&self) -> bool {
		self.0 == [1.0]
	}

	/// True for `[-1.0]`, the multiplicative-identity negation.
	pub fn is_negation(&self) -> bool {
		self.0 == [-1.0]
	}

	/// Number of elements in this vector.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// True when this vector holds no elements.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// The tagged value held by one [`HEType`] slot.
#[derive(Debug, Clone)]
pub enum HESlot {
	/// An unencrypted, CKKS-encodable vector.
	Plain(PlaintextVector),
	/// A CKKS ciphertext.
	Cipher(Ciphertext),
}

/// A single per-element HE value: the plaintext/ciphertext tag plus the
/// complex-packing bit that must agree between any two operands a binary
/// kernel combines.
#[derive(Debug, Clone)]
pub struct HEType {
	slot: HESlot,
	complex_packing: bool,
}

impl HEType {
	/// Wraps a plaintext vector as an unencrypted slot.
	pub fn plain(vector: PlaintextVector, complex_packing: bool) -> Self {
		HEType {
			slot: HESlot::Plain(vector),
			complex_packing,
		}
	}

	/// Wraps a ciphertext as an encrypted slot.
	pub fn cipher(cipher: Ciphertext, complex_packing: bool) -> Self {
		HEType {
			slot: HESlot::Cipher(cipher),
			complex_packing,
		}
	}

	/// Whether this slot packs the imaginary lane as an independent batch
	/// element.
	pub fn complex_packing(&self) -> bool {
		self.complex_packing
	}

	/// True when this slot holds a ciphertext.
	pub fn is_cipher(&self) -> bool {
		matches!(self.slot, HESlot::Cipher(_))
	}

	/// True when this slot holds a plaintext vector.
	pub fn is_plain(&self) -> bool {
		matches!(self.slot, HESlot::Plain(_))
	}

	/// Borrows the plaintext vector, if this slot is unencrypted.
	pub fn as_plain(&self) -> Option<&PlaintextVector> {
		match &self.slot {
			HESlot::Plain(p) => Some(p),
			HESlot::Cipher(_) => None,
		}
	}

	/// Borrows the ciphertext, if this slot is encrypted.
	pub fn as_cipher(&self) -> Option<&Ciphertext> {
		match &self.slot {
			HESlot::Cipher(c) => Some(c),
			HESlot::Plain(_) => None,
		}
	}

	/// Mutably borrows the ciphertext, if this slot is encrypted.
	pub fn as_cipher_mut(&mut self) -> Option<&mut Ciphertext> {
		match &mut self.slot {
			HESlot::Cipher(c) => Some(c),
			HESlot::Plain(_) => None,
		}
	}

	/// Consumes this slot, requiring it to be a ciphertext.
	pub fn into_cipher(self) -> Result<Ciphertext> {
		match self.slot {
			HESlot::Cipher(c) => Ok(c),
			HESlot::Plain(_) => Err(Error::ShapeMismatch(
				"expected an encrypted slot, found plaintext".into(),
			)),
		}
	}

	/// Consumes this slot, requiring it to be a plaintext vector.
	pub fn into_plain(self) -> Result<PlaintextVector> {
		match self.slot {
			HESlot::Plain(p) => Ok(p),
			HESlot::Cipher(_) => Err(Error::ShapeMismatch(
				"expected a plaintext slot, found ciphertext".into(),
			)),
		}
	}

	/// Dispatches a binary kernel across the 2x2 cipher/plain tag
	/// cross-product, checking `complex_packing` agreement first. Each
	/// closure implements one quadrant of the dispatch table a kernel's
	/// common contract requires.
	pub fn dispatch_binary<Cc, Cp, Pc, Pp>(
		&self,
		other: &HEType,
		cipher_cipher: Cc,
		cipher_plain: Cp,
		plain_cipher: Pc,
		plain_plain: Pp,
	) -> Result<HEType>
	where
		Cc: FnOnce(&Ciphertext, &Ciphertext) -> Result<Ciphertext>,
		Cp: FnOnce(&Ciphertext, &PlaintextVector) -> Result<Ciphertext>,
		Pc: FnOnce(&PlaintextVector, &Ciphertext) -> Result<Ciphertext>,
		Pp: FnOnce(&PlaintextVector, &PlaintextVector) -> Result<PlaintextVector>,
	{
		if self.complex_packing != other.complex_packing {
			return Err(Error::TypeTagMismatch);
		}

		let slot = match (&self.slot, &other.slot) {
			(HESlot::Cipher(a), HESlot::Cipher(b)) => HESlot::Cipher(cipher_cipher(a, b)?),
			(HESlot::Cipher(a), HESlot::Plain(b)) => HESlot::Cipher(cipher_plain(a, b)?),
			(HESlot::Plain(a), HESlot::Cipher(b)) => HESlot::Cipher(plain_cipher(a, b)?),
			(HESlot::Plain(a), HESlot::Plain(b)) => HESlot::Plain(plain_plain(a, b)?),
		};

		Ok(HEType {
			slot,
			complex_packing: self.complex_packing,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn additive_identity_detection() {
		assert!(PlaintextVector::default().is_additive_identity());
		assert!(PlaintextVector(vec![0.0]).is_additive_identity());
		assert!(!PlaintextVector(vec![0.0, 0.0]).is_additive_identity());
	}

	#[test]
	fn dispatch_binary_rejects_packing_mismatch() {
		let a = HEType::plain(PlaintextVector(vec![1.0]), true);
		let b = HEType::plain(PlaintextVector(vec![2.0]), false);

		let result = a.dispatch_binary(
			&b,
			|_, _| unreachable!(),
			|_, _| unreachable!(),
			|_, _| unreachable!(),
			|_, _| unreachable!(),
		);

		assert!(matches!(result, Err(Error::TypeTagMismatch)));
	}

	#[test]
	fn dispatch_binary_plain_plain_adds() {
		let a = HEType::plain(PlaintextVector(vec![1.0, 2.0]), false);
		let b = HEType::plain(PlaintextVector(vec![3.0, 4.0]), false);

		let sum = a
			.dispatch_binary(
				&b,
				|_, _| unreachable!(),
				|_, _| unreachable!(),
				|_, _| unreachable!(),
				|x, y| {
					Ok(PlaintextVector(
						x.0.iter().zip(y.0.iter()).map(|(l, r)| l + r).collect(),
					))
				},
			)
			.unwrap();

		assert_eq!(sum.into_plain().unwrap().0, vec![4.0, 6.0]);
	}
}
