//! A multi-dimensional arrangement of [`HEType`] slots with an optional
//! batch-packing axis.

use crate::error::{Error, Result};
use crate::he_type::HEType;

/// The host element type a [`Tensor`] logically holds before packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
	/// 32-bit IEEE float.
	F32,
	/// 64-bit IEEE float.
	F64,
	/// 32-bit signed integer.
	I32,
	/// 64-bit signed integer.
	I64,
}

/// A tensor of [`HEType`] slots. `shape[0]` is the batch axis; when
/// `packed`, that axis is folded into each slot's CKKS SIMD lanes rather
/// than materialized as separate slots.
#[derive(Debug, Clone)]
pub struct Tensor {
	shape: Vec<usize>,
	element_type: ElementType,
	packed: bool,
	batch_size: usize,
	slots: Vec<HEType>,
}

impl Tensor {
	/// Builds a tensor, checking the packing and complex-packing invariants
	/// from the data model: if `packed`, `shape[0] == batch_size` and
	/// `batch_size` cannot exceed `slot_count` (doubled when any slot uses
	/// complex packing); every slot must agree on `complex_packing`; and the
	/// slot count must equal `shape_size(shape) / batch_size`.
	pub fn new(
		shape: Vec<usize>,
		element_type: ElementType,
		packed: bool,
		slots: Vec<HEType>,
		slot_count: usize,
	) -> Result<Self> {
		let batch_size = if packed { *shape.first().unwrap_or(&1) } else { 1 };

		if packed {
			let complex_packing = slots.first().map(|s| s.complex_packing()).unwrap_or(false);
			let capacity = slot_count * if complex_packing { 2 } else { 1 };
			if batch_size > capacity {
				return Err(Error::ShapeMismatch(format!(
					"packed batch size {batch_size} exceeds slot capacity {capacity}"
				)));
			}
		}

		let complex_packing = slots.first().map(|s| s.complex_packing());
		if let Some(expected) = complex_packing {
			if slots.iter().any(|s| s.complex_packing() != expected) {
				return Err(Error::TypeTagMismatch);
			}
		}

		let shape_size: usize = shape.iter().product();
		let expected_slots = if batch_size == 0 { 0 } else { shape_size / batch_size };
		if slots.len() != expected_slots {
			return Err(Error::ShapeMismatch(format!(
				"expected {expected_slots} slots for shape {shape:?} (batch_size {batch_size}), got {}",
				slots.len()
			)));
		}

		Ok(Tensor {
			shape,
			element_type,
			packed,
			batch_size,
			slots,
		})
	}

	/// The tensor's logical shape.
	pub fn shape(&self) -> &[usize] {
		&self.shape
	}

	/// The host element type this tensor's slots decode to.
	pub fn element_type(&self) -> ElementType {
		self.element_type
	}

	/// Whether the batch axis is folded into plaintext/ciphertext slots.
	pub fn packed(&self) -> bool {
		self.packed
	}

	/// `shape[0]` when packed, else 1.
	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// `shape_size(shape) / batch_size`, the number of [`HEType`] slots this
	/// tensor holds.
	pub fn batched_element_count(&self) -> usize {
		self.slots.len()
	}

	/// Borrows the slot array.
	pub fn slots(&self) -> &[HEType] {
		&self.slots
	}

	/// Mutably borrows the slot array.
	pub fn slots_mut(&mut self) -> &mut [HEType] {
		&mut self.slots
	}

	/// Consumes the tensor, returning its slot array.
	pub fn into_slots(self) -> Vec<HEType> {
		self.slots
	}

	/// True if any slot in this tensor is a ciphertext. A tensor is
	/// otherwise all-plaintext; the data model only distinguishes these by
	/// observing the slots, not by a dedicated flag.
	pub fn is_encrypted(&self) -> bool {
		self.slots.iter().any(HEType::is_cipher)
	}

	/// Applies `f` to every slot, producing a new tensor with the same
	/// shape/packing metadata.
	pub fn map<F>(&self, mut f: F) -> Result<Tensor>
	where
		F: FnMut(&HEType) -> Result<HEType>,
	{
		let slots = self
			.slots
			.iter()
			.map(&mut f)
			.collect::<Result<Vec<_>>>()?;

		Ok(Tensor {
			shape: self.shape.clone(),
			element_type: self.element_type,
			packed: self.packed,
			batch_size: self.batch_size,
			slots,
		})
	}

	/// Zips this tensor's slots with `other`'s, applying `f` pairwise.
	/// Fails with [`Error::ShapeMismatch`] if the tensors don't have the
	/// same slot count.
	pub fn zip<F>(&self, other: &Tensor, mut f: F) -> Result<Tensor>
	where
		F: FnMut(&HEType, &HEType) -> Result<HEType>,
	{
		if self.slots.len() != other.slots.len() {
			return Err(Error::ShapeMismatch(format!(
				"cannot zip tensors with {} and {} slots",
				self.slots.len(),
				other.slots.len()
			)));
		}

		let slots = self
			.slots
			.iter()
			.zip(other.slots.iter())
			.map(|(a, b)| f(a, b))
			.collect::<Result<Vec<_>>>()?;

		Ok(Tensor {
			shape: self.shape.clone(),
			element_type: self.element_type,
			packed: self.packed,
			batch_size: self.batch_size,
			slots,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::he_type::PlaintextVector;

	fn plain_tensor(shape: Vec<usize>, values: &[f64]) -> Tensor {
		let slots = values
			.iter()
			.map(|v| HEType::plain(PlaintextVector::scalar(*v), false))
			.collect();
		Tensor::new(shape, ElementType::F64, false, slots, 4096).unwrap()
	}

	#[test]
	fn unpacked_slot_count_matches_shape_size() {
		let t = plain_tensor(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
		assert_eq!(t.batched_element_count(), 6);
		assert!(!t.is_encrypted());
	}

	#[test]
	fn rejects_mismatched_slot_count() {
		let slots = vec![HEType::plain(PlaintextVector::scalar(1.0), false)];
		let result = Tensor::new(vec![2, 3], ElementType::F64, false, slots, 4096);
		assert!(matches!(result, Err(Error::ShapeMismatch(_))));
	}

	#[test]
	fn rejects_complex_packing_disagreement() {
		let slots = vec![
			HEType::plain(PlaintextVector::scalar(1.0), false),
			HEType::plain(PlaintextVector::scalar(2.0), true),
		];
		let result = Tensor::new(vec![2], ElementType::F64, false, slots, 4096);
		assert!(matches!(result, Err(Error::TypeTagMismatch)));
	}

	#[test]
	fn zip_adds_elementwise() {
		let a = plain_tensor(vec![2], &[1.0, 2.0]);
		let b = plain_tensor(vec![2], &[3.0, 4.0]);

		let sum = a
			.zip(&b, |x, y| {
				x.dispatch_binary(
					y,
					|_, _| unreachable!(),
					|_, _| unreachable!(),
					|_, _| unreachable!(),
					|l, r| Ok(PlaintextVector(vec![l.0[0] + r.0[0]])),
				)
			})
			.unwrap();

		let values: Vec<f64> = sum
			.slots()
			.iter()
			.map(|s| s.as_plain().unwrap().0[0])
			.collect();
		assert_eq!(values, vec![4.0, 6.0]);
	}
}
