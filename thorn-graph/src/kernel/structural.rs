//! Shape-only transforms: `Pad`, `Reshape`, `Slice`, `Concat`, `Broadcast`,
//! `Reverse` (spec §4.3: "these never touch ciphertext contents, only the
//! arrangement of slots, so they run identically on plaintext and
//! ciphertext operands").

use thorn_crypto::{HEType, PlaintextVector};

use crate::error::{Error, Result};

/// `Reshape`: row-major reinterpretation of `slots` under a new `shape`.
/// The slot count must be unchanged; only the stride metadata differs,
/// which the caller (not this function) is responsible for tracking.
pub fn reshape(slots: &[HEType], old_shape: &[usize], new_shape: &[usize]) -> Result<Vec<HEType>> {
	let old_size: usize = old_shape.iter().product();
	let new_size: usize = new_shape.iter().product();
	if old_size != new_size {
		return Err(Error::ShapeMismatch(format!(
			"reshape changes element count: {old_shape:?} ({old_size}) -> {new_shape:?} ({new_size})"
		)));
	}
	Ok(slots.to_vec())
}

/// `Slice`: extracts the row-major hyperrectangle `[lower, upper)` from a
/// tensor of the given `shape`.
pub fn slice(slots: &[HEType], shape: &[usize], lower: &[usize], upper: &[usize]) -> Result<Vec<HEType>> {
	if lower.len() != shape.len() || upper.len() != shape.len() {
		return Err(Error::ShapeMismatch("slice bounds rank must match tensor rank".into()));
	}

	let strides = row_major_strides(shape);
	let out_shape: Vec<usize> = lower.iter().zip(upper).map(|(&l, &u)| u - l).collect();
	let out_size: usize = out_shape.iter().product();
	let mut out = Vec::with_capacity(out_size);

	for flat in 0..out_size {
		let mut idx = unflatten(flat, &out_shape);
		for (i, l) in idx.iter_mut().zip(lower) {
			*i += l;
		}
		let src = idx.iter().zip(&strides).map(|(i, s)| i * s).sum::<usize>();
		out.push(slots[src].clone());
	}

	Ok(out)
}

/// How [`pad`] fills the slots surrounding the operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadMode {
	/// Copies the nearest in-bounds edge slot along each padded axis.
	Edge,
	/// Fills with a plaintext scalar, encoded lazily at whatever parms_id
	/// and scale the slot it's later combined with carries (the same
	/// encode-on-use path every cipher-plain kernel already follows).
	Constant(f64),
}

/// `Pad`: surrounds `shape` with `pad_below`/`pad_above` slots per axis,
/// filled per `mode`.
pub fn pad(slots: &[HEType], shape: &[usize], pad_below: &[usize], pad_above: &[usize], mode: PadMode) -> Result<Vec<HEType>> {
	if pad_below.len() != shape.len() || pad_above.len() != shape.len() {
		return Err(Error::ShapeMismatch("pad widths rank must match tensor rank".into()));
	}

	let complex_packing = slots.first().map(HEType::complex_packing).unwrap_or(false);
	let out_shape: Vec<usize> = shape
		.iter()
		.zip(pad_below)
		.zip(pad_above)
		.map(|((&s, &b), &a)| s + b + a)
		.collect();
	let out_size: usize = out_shape.iter().product();
	let out_strides = row_major_strides(&out_shape);
	let in_strides = row_major_strides(shape);
	let in_size: usize = shape.iter().product();

	let fill = match mode {
		PadMode::Edge => HEType::plain(PlaintextVector::default(), complex_packing),
		PadMode::Constant(value) if value == 0.0 => HEType::plain(PlaintextVector::default(), complex_packing),
		PadMode::Constant(value) => HEType::plain(PlaintextVector::scalar(value), complex_packing),
	};
	let mut out = vec![fill; out_size];

	for flat in 0..in_size {
		let idx = unflatten(flat, shape);
		let src = idx.iter().zip(&in_strides).map(|(i, s)| i * s).sum::<usize>();
		let dst_idx: Vec<usize> = idx.iter().zip(pad_below).map(|(i, b)| i + b).collect();
		let dst = dst_idx.iter().zip(&out_strides).map(|(i, s)| i * s).sum::<usize>();
		out[dst] = slots[src].clone();
	}

	if mode == PadMode::Edge {
		for flat in 0..out_size {
			let idx = unflatten(flat, &out_shape);
			let clamped: Vec<usize> =
				idx.iter().zip(pad_below).zip(shape).map(|((&i, &b), &s)| i.saturating_sub(b).min(s - 1)).collect();
			let src_idx: Vec<usize> = clamped.iter().zip(pad_below).map(|(&c, &b)| c + b).collect();
			let src = src_idx.iter().zip(&out_strides).map(|(i, s)| i * s).sum::<usize>();
			if src != flat {
				out[flat] = out[src].clone();
			}
		}
	}

	Ok(out)
}

/// `Concat` along `axis`: every input tensor must agree on every other axis.
pub fn concat(inputs: &[(&[HEType], &[usize])], axis: usize) -> Result<(Vec<HEType>, Vec<usize>)> {
	let (_, first_shape) = inputs.first().ok_or_else(|| Error::ShapeMismatch("concat requires at least one input".into()))?;
	let rank = first_shape.len();
	let mut out_shape = first_shape.to_vec();
	out_shape[axis] = 0;

	for (_, shape) in inputs {
		if shape.len() != rank {
			return Err(Error::ShapeMismatch("concat inputs must share rank".into()));
		}
		for (i, (&s, &f)) in shape.iter().zip(first_shape.iter()).enumerate() {
			if i != axis && s != f {
				return Err(Error::ShapeMismatch(format!("concat axis {i} mismatch: {s} vs {f}")));
			}
		}
		out_shape[axis] += shape[axis];
	}

	let out_size: usize = out_shape.iter().product();
	let out_strides = row_major_strides(&out_shape);
	let mut out = Vec::with_capacity(out_size);
	out.resize_with(out_size, || {
		HEType::plain(PlaintextVector::default(), false)
	});

	let mut axis_offset = 0;
	for (slots, shape) in inputs {
		let in_size: usize = shape.iter().product();
		let in_strides = row_major_strides(shape);
		for flat in 0..in_size {
			let idx = unflatten(flat, shape);
			let src = idx.iter().zip(&in_strides).map(|(i, s)| i * s).sum::<usize>();
			let mut dst_idx = idx.clone();
			dst_idx[axis] += axis_offset;
			let dst = dst_idx.iter().zip(&out_strides).map(|(i, s)| i * s).sum::<usize>();
			out[dst] = slots[src].clone();
		}
		axis_offset += shape[axis];
	}

	Ok((out, out_shape))
}

/// `Broadcast`: repeats a `shape`-shaped tensor along the prepended or
/// size-1 axes of `target_shape`.
pub fn broadcast(slots: &[HEType], shape: &[usize], target_shape: &[usize]) -> Result<Vec<HEType>> {
	let pad_rank = target_shape.len() - shape.len();
	let padded_shape: Vec<usize> = std::iter::repeat(1).take(pad_rank).chain(shape.iter().copied()).collect();
	let in_strides = row_major_strides(&padded_shape);
	let out_size: usize = target_shape.iter().product();
	let mut out = Vec::with_capacity(out_size);

	for flat in 0..out_size {
		let idx = unflatten(flat, target_shape);
		let src_idx: Vec<usize> = idx.iter().zip(&padded_shape).map(|(&i, &d)| if d == 1 { 0 } else { i }).collect();
		let src = src_idx.iter().zip(&in_strides).map(|(i, s)| i * s).sum::<usize>();
		out.push(slots[src].clone());
	}

	Ok(out)
}

/// `Reverse`: flips slot order along each axis named in `axes`.
pub fn reverse(slots: &[HEType], shape: &[usize], axes: &[usize]) -> Result<Vec<HEType>> {
	let strides = row_major_strides(shape);
	let size: usize = shape.iter().product();
	let mut out = Vec::with_capacity(size);

	for flat in 0..size {
		let mut idx = unflatten(flat, shape);
		for &axis in axes {
			idx[axis] = shape[axis] - 1 - idx[axis];
		}
		let src = idx.iter().zip(&strides).map(|(i, s)| i * s).sum::<usize>();
		out.push(slots[src].clone());
	}

	Ok(out)
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
	let mut strides = vec![1; shape.len()];
	for i in (0..shape.len().saturating_sub(1)).rev() {
		strides[i] = strides[i + 1] * shape[i + 1];
	}
	strides
}

fn unflatten(mut flat: usize, shape: &[usize]) -> Vec<usize> {
	let strides = row_major_strides(shape);
	let mut idx = vec![0; shape.len()];
	for (i, stride) in strides.iter().enumerate() {
		idx[i] = flat / stride;
		flat %= stride;
	}
	idx
}

#[cfg(test)]
mod tests {
	use super::*;

	fn plain(v: f64) -> HEType {
		HEType::plain(PlaintextVector::scalar(v), false)
	}

	#[test]
	fn reshape_rejects_element_count_change() {
		let slots = vec![plain(1.0), plain(2.0)];
		assert!(matches!(reshape(&slots, &[2], &[3]), Err(Error::ShapeMismatch(_))));
	}

	#[test]
	fn slice_extracts_row() {
		let slots: Vec<HEType> = (0..6).map(|i| plain(i as f64)).collect();
		let out = slice(&slots, &[2, 3], &[1, 0], &[2, 3]).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![3.0, 4.0, 5.0]);
	}

	#[test]
	fn reverse_flips_last_axis() {
		let slots: Vec<HEType> = (0..3).map(|i| plain(i as f64)).collect();
		let out = reverse(&slots, &[3], &[0]).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![2.0, 1.0, 0.0]);
	}

	#[test]
	fn broadcast_repeats_size_one_axis() {
		let slots = vec![plain(7.0)];
		let out = broadcast(&slots, &[1], &[3]).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![7.0, 7.0, 7.0]);
	}

	#[test]
	fn concat_along_axis_zero() {
		let a: Vec<HEType> = vec![plain(1.0), plain(2.0)];
		let b: Vec<HEType> = vec![plain(3.0)];
		let (out, shape) = concat(&[(&a, &[2]), (&b, &[1])], 0).unwrap();
		assert_eq!(shape, vec![3]);
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![1.0, 2.0, 3.0]);
	}

	#[test]
	fn pad_constant_fills_with_the_supplied_value() {
		let slots: Vec<HEType> = vec![plain(1.0), plain(2.0)];
		let out = pad(&slots, &[2], &[1], &[1], PadMode::Constant(9.0)).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![9.0, 1.0, 2.0, 9.0]);
	}

	#[test]
	fn pad_edge_copies_the_nearest_boundary_slot() {
		let slots: Vec<HEType> = vec![plain(1.0), plain(2.0)];
		let out = pad(&slots, &[2], &[1], &[2], PadMode::Edge).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		assert_eq!(values, vec![1.0, 1.0, 2.0, 2.0, 2.0]);
	}

	#[test]
	fn pad_edge_handles_two_dimensional_corners() {
		let slots: Vec<HEType> = vec![plain(1.0), plain(2.0), plain(3.0), plain(4.0)];
		let out = pad(&slots, &[2, 2], &[1, 1], &[0, 0], PadMode::Edge).unwrap();
		let values: Vec<f64> = out.iter().map(|s| s.as_plain().unwrap().0[0]).collect();
		// Padded shape is [3, 3]; row 0 repeats row 0 of the input, column 0
		// repeats column 0, and the (0,0) corner repeats the input's (0,0).
		assert_eq!(values, vec![1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 4.0]);
	}
}
