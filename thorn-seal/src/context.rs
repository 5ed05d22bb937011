use std::ffi::c_int;
use std::ffi::c_void;
use std::ptr::null_mut;

use crate::bindgen;
use crate::error::*;
use crate::parameters::EncryptionParameters;
use crate::modulus::SecurityLevel;

/// Validates a set of [`EncryptionParameters`] and pre-computes the modulus
/// switching chain derived from them.
///
/// The chain starts at the key-level parameters (used only by key material)
/// and descends by dropping the last prime of the coefficient modulus at
/// each step until no primes remain; `get_chain_index` on a ciphertext or
/// plaintext is its position in that descent.
pub struct Context {
	pub(crate) handle: *mut c_void,
}

unsafe impl Sync for Context {}
unsafe impl Send for Context {}

impl Context {
	/// Validates `params` and builds the context. `expand_mod_chain` decides
	/// whether the full modulus switching chain is pre-computed.
	pub fn new(
		params: &EncryptionParameters,
		expand_mod_chain: bool,
		security_level: SecurityLevel,
	) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::SEALContext_Create(
				params.get_handle(),
				expand_mod_chain,
				security_level as c_int,
				&mut handle,
			)
		})?;

		Ok(Context { handle })
	}

	/// Builds a context without enforcing a standard security level. Testing
	/// only: never use parameters validated this way for real data.
	#[cfg(feature = "insecure-params")]
	pub fn new_insecure(params: &EncryptionParameters, expand_mod_chain: bool) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::SEALContext_Create(params.get_handle(), expand_mod_chain, 0, &mut handle)
		})?;

		Ok(Context { handle })
	}

	/// Returns the handle to the underlying SEAL object.
	pub fn get_handle(&self) -> *mut c_void {
		self.handle
	}

	/// Returns the parms_id of the key-level context data.
	pub fn get_key_parms_id(&self) -> Result<Vec<u64>> {
		let mut parms_id: Vec<u64> = Vec::with_capacity(EncryptionParameters::block_size() as usize);

		convert_seal_error(unsafe {
			bindgen::SEALContext_KeyParmsId(self.handle, parms_id.as_mut_ptr())
		})?;
		unsafe { parms_id.set_len(EncryptionParameters::block_size() as usize) };

		Ok(parms_id)
	}

	/// Returns the parms_id of the top of the modulus chain (freshly
	/// encrypted ciphertexts live here).
	pub fn get_first_parms_id(&self) -> Result<Vec<u64>> {
		let mut parms_id: Vec<u64> = Vec::with_capacity(EncryptionParameters::block_size() as usize);

		convert_seal_error(unsafe {
			bindgen::SEALContext_FirstParmsId(self.handle, parms_id.as_mut_ptr())
		})?;
		unsafe { parms_id.set_len(EncryptionParameters::block_size() as usize) };

		Ok(parms_id)
	}

	/// Returns the parms_id of the bottom of the modulus chain.
	pub fn get_last_parms_id(&self) -> Result<Vec<u64>> {
		let mut parms_id: Vec<u64> = Vec::with_capacity(EncryptionParameters::block_size() as usize);

		convert_seal_error(unsafe {
			bindgen::SEALContext_LastParmsId(self.handle, parms_id.as_mut_ptr())
		})?;
		unsafe { parms_id.set_len(EncryptionParameters::block_size() as usize) };

		Ok(parms_id)
	}

	/// Returns the context data for an arbitrary parms_id in the chain.
	pub fn get_context_data(&self, parms_id: &[u64]) -> Result<ContextData> {
		let mut context_data: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			let mut parms_id = parms_id.to_vec();
			bindgen::SEALContext_GetContextData(self.handle, parms_id.as_mut_ptr(), &mut context_data)
		})?;

		if context_data.is_null() {
			return Err(Error::InvalidPointer);
		}

		Ok(ContextData::new(context_data))
	}

	/// Returns the context data at the top of the chain.
	pub fn get_first_context_data(&self) -> Result<ContextData> {
		let mut context_data: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::SEALContext_FirstContextData(self.handle, &mut context_data)
		})?;

		if context_data.is_null() {
			return Err(Error::InvalidPointer);
		}

		Ok(ContextData::new(context_data))
	}

	/// Returns the context data at the bottom of the chain.
	pub fn get_last_context_data(&self) -> Result<ContextData> {
		let mut context_data: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::SEALContext_LastContextData(self.handle, &mut context_data)
		})?;

		if context_data.is_null() {
			return Err(Error::InvalidPointer);
		}

		Ok(ContextData::new(context_data))
	}

	/// Returns the zero-based depth of `parms_id` below the top of the chain,
	/// i.e. its chain index. The top of the chain is index 0.
	pub fn get_chain_index(&self, parms_id: &[u64]) -> Result<usize> {
		let mut index = 0usize;
		let mut data = self.get_first_context_data()?;

		loop {
			if data.get_parms_id()? == parms_id {
				return Ok(index);
			}

			data = match data.next_context_data()? {
				Some(next) => next,
				None => return Err(Error::ChainExhausted),
			};

			index += 1;
		}
	}
}

impl Drop for Context {
	fn drop(&mut self) {
		convert_seal_error(unsafe { bindgen::SEALContext_Destroy(self.handle) })
			.expect("Internal error in Context::drop().");
	}
}

/// Pre-computation data SEAL holds for one set of encryption parameters in
/// the modulus switching chain.
#[derive(Debug)]
pub struct ContextData {
	handle: *mut c_void,
}

unsafe impl Sync for ContextData {}
unsafe impl Send for ContextData {}

impl ContextData {
	pub(crate) fn new(handle: *mut c_void) -> Self {
		Self { handle }
	}

	/// Returns the handle to the underlying SEAL object.
	pub fn get_handle(&self) -> *mut c_void {
		self.handle
	}

	/// Returns the encryption parameters this context data was computed for.
	pub fn get_encryption_parameters(&self) -> Result<EncryptionParameters> {
		let mut parms: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::ContextData_Parms(self.handle, &mut parms) })?;

		Ok(EncryptionParameters { handle: parms })
	}

	/// Returns the parms_id identifying this context data's position in the
	/// modulus switching chain.
	pub fn get_parms_id(&self) -> Result<Vec<u64>> {
		let mut parms_id: Vec<u64> = Vec::with_capacity(EncryptionParameters::block_size() as usize);

		convert_seal_error(unsafe {
			bindgen::ContextData_ParmsId(self.handle, parms_id.as_mut_ptr())
		})?;
		unsafe { parms_id.set_len(EncryptionParameters::block_size() as usize) };

		Ok(parms_id)
	}

	/// Returns the total bit count of the coefficient modulus at this level.
	pub fn get_total_coeff_modulus_bit_count(&self) -> Result<i32> {
		let mut bit_count: i32 = 0;

		convert_seal_error(unsafe {
			bindgen::ContextData_TotalCoeffModulusBitCount(self.handle, &mut bit_count)
		})?;

		Ok(bit_count)
	}

	/// Returns the next context data down the chain, or `None` at the bottom.
	pub fn next_context_data(&self) -> Result<Option<ContextData>> {
		let mut next: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::ContextData_NextContextData(self.handle, &mut next) })?;

		if next.is_null() {
			Ok(None)
		} else {
			Ok(Some(ContextData::new(next)))
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::*;

	fn make_context() -> Context {
		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(DegreeType::D8192)
			.set_coefficient_modulus(
				CoefficientModulus::create(DegreeType::D8192, &[60, 40, 40, 60]).unwrap(),
			)
			.build()
			.unwrap();

		Context::new(&params, true, SecurityLevel::TC128).unwrap()
	}

	#[test]
	fn can_create_and_drop_context() {
		std::mem::drop(make_context());
	}

	#[test]
	fn chain_index_descends_from_zero() {
		let ctx = make_context();
		let first = ctx.get_first_parms_id().unwrap();
		let last = ctx.get_last_parms_id().unwrap();

		assert_eq!(ctx.get_chain_index(&first).unwrap(), 0);
		assert!(ctx.get_chain_index(&last).unwrap() > 0);
	}
}
