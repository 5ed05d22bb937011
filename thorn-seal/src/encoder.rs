use std::ffi::c_void;
use std::fmt::Debug;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::Result;
use crate::{bindgen, try_seal, Context, MemoryPool, Plaintext};

/// Encodes vectors of real (or, with `encode_complex`, complex) doubles into
/// [`Plaintext`] polynomials and back. There is no other way to build a CKKS
/// plaintext: unlike BFV, CKKS has no integer batch encoder.
pub struct CKKSEncoder {
	handle: AtomicPtr<c_void>,
	parms_id: Vec<u64>,
	scale: f64,
}

unsafe impl Sync for CKKSEncoder {}
unsafe impl Send for CKKSEncoder {}

impl CKKSEncoder {
	/// Creates an encoder bound to `ctx`'s top-of-chain parameters, encoding
	/// at the given default `scale`.
	pub fn new(ctx: &Context, scale: f64) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();
		let parms_id = ctx.get_first_parms_id()?;

		try_seal!(unsafe { bindgen::CKKSEncoder_Create(ctx.get_handle(), &mut handle) })?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
			parms_id,
			scale,
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}

	/// Returns the default encoding scale this encoder was constructed with.
	pub fn scale(&self) -> f64 {
		self.scale
	}

	/// Returns the number of real-valued slots this encoder produces:
	/// `poly_modulus_degree / 2`.
	pub fn get_slot_count(&self) -> usize {
		let mut count: u64 = 0;

		try_seal!(unsafe { bindgen::CKKSEncoder_SlotCount(self.get_handle(), &mut count) })
			.expect("Internal error in CKKSEncoder::get_slot_count().");

		count as usize
	}

	/// Encodes `data` (one value per real lane) into a plaintext at this
	/// encoder's scale and parms_id.
	pub fn encode_f64(&self, data: &[f64]) -> Result<Plaintext> {
		self.encode_f64_at(data, &self.parms_id, self.scale)
	}

	/// Encodes `data` at an explicit `parms_id`/`scale` instead of the
	/// encoder's default, for encoding a plaintext that must be combined
	/// with a ciphertext already mod-switched below the top of the chain.
	pub fn encode_f64_at(&self, data: &[f64], parms_id: &[u64], scale: f64) -> Result<Plaintext> {
		let mem = MemoryPool::new()?;
		let plaintext = Plaintext::new()?;

		try_seal!(unsafe {
			let mut parms_id = parms_id.to_vec();
			bindgen::CKKSEncoder_Encode1(
				self.get_handle(),
				data.len() as u64,
				data.as_ptr() as *mut f64,
				parms_id.as_mut_ptr(),
				scale,
				plaintext.get_handle(),
				mem.get_handle(),
			)
		})?;

		Ok(plaintext)
	}

	/// Encodes `real`/`imag` (equal length, one complex value per slot) into
	/// a plaintext, doubling usable capacity relative to `encode_f64` when
	/// `complex_packing` is enabled at the tensor layer.
	pub fn encode_complex(&self, real: &[f64], imag: &[f64]) -> Result<Plaintext> {
		assert_eq!(real.len(), imag.len());

		let mem = MemoryPool::new()?;
		let plaintext = Plaintext::new()?;

		try_seal!(unsafe {
			let mut parms_id = self.parms_id.clone();
			bindgen::CKKSEncoder_Encode2(
				self.get_handle(),
				real.len() as u64,
				real.as_ptr() as *mut f64,
				imag.as_ptr() as *mut f64,
				parms_id.as_mut_ptr(),
				self.scale,
				plaintext.get_handle(),
				mem.get_handle(),
			)
		})?;

		Ok(plaintext)
	}

	/// Decodes `plaintext` into its real-lane values.
	pub fn decode_f64(&self, plaintext: &Plaintext) -> Result<Vec<f64>> {
		let mut data = Vec::with_capacity(self.get_slot_count());
		let mut size: u64 = 0;

		try_seal!(unsafe {
			bindgen::CKKSEncoder_Decode1(
				self.get_handle(),
				plaintext.get_handle(),
				&mut size,
				data.as_mut_ptr(),
				null_mut(),
			)
		})?;

		if data.capacity() < size as usize {
			panic!("Allocation overflow in CKKSEncoder::decode_f64()");
		}

		unsafe { data.set_len(size as usize) };

		Ok(data)
	}

	/// Decodes `plaintext` into its real and imaginary lane values.
	pub fn decode_complex(&self, plaintext: &Plaintext) -> Result<(Vec<f64>, Vec<f64>)> {
		let slots = self.get_slot_count();
		let mut real = Vec::with_capacity(slots);
		let mut imag = Vec::with_capacity(slots);
		let mut size: u64 = 0;

		try_seal!(unsafe {
			bindgen::CKKSEncoder_Decode2(
				self.get_handle(),
				plaintext.get_handle(),
				&mut size,
				real.as_mut_ptr(),
				imag.as_mut_ptr(),
				null_mut(),
			)
		})?;

		unsafe {
			real.set_len(size as usize);
			imag.set_len(size as usize);
		}

		Ok((real, imag))
	}
}

impl Debug for CKKSEncoder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CKKSEncoder")
			.field("handle", &self.handle)
			.field("parms_id", &self.parms_id)
			.field("scale", &self.scale)
			.finish()
	}
}

impl Drop for CKKSEncoder {
	fn drop(&mut self) {
		unsafe {
			bindgen::CKKSEncoder_Destroy(self.get_handle());
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		CkksEncryptionParametersBuilder, CoefficientModulus, Context, DegreeType, SecurityLevel,
	};

	use super::*;

	fn float_assert_eq(a: f64, b: f64) {
		assert!((a - b).abs() < 0.0001);
	}

	fn create_ckks_context(degree: DegreeType, bit_sizes: &[i32]) -> Context {
		let modulus_chain = CoefficientModulus::create(degree, bit_sizes).unwrap();
		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(degree)
			.set_coefficient_modulus(modulus_chain)
			.build()
			.unwrap();

		Context::new(&params, false, SecurityLevel::TC128).unwrap()
	}

	#[test]
	fn can_create_and_drop_ckks_encoder() {
		let ctx = create_ckks_context(DegreeType::D8192, &[60, 40, 40, 60]);
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();

		std::mem::drop(encoder);
	}

	#[test]
	fn slot_count_is_half_poly_degree() {
		let ctx = create_ckks_context(DegreeType::D8192, &[60, 40, 40, 60]);
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();

		assert_eq!(encoder.get_slot_count(), 8192 / 2);
	}

	#[test]
	fn encode_decode_round_trips_real_values() {
		let ctx = create_ckks_context(DegreeType::D8192, &[60, 40, 40, 60]);
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();

		let data: Vec<f64> = (0..encoder.get_slot_count()).map(|i| i as f64 - 2048.0).collect();

		let plaintext = encoder.encode_f64(&data).unwrap();
		let decoded = encoder.decode_f64(&plaintext).unwrap();

		for (a, b) in data.into_iter().zip(decoded) {
			float_assert_eq(a, b);
		}
	}
}
