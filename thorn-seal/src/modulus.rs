use std::ffi::c_void;
use std::ptr::null_mut;

use crate::bindgen;
use crate::error::{convert_seal_error, Result};
use crate::parameters::DegreeType;

/// A single prime modulus used in a coefficient modulus chain.
#[derive(Debug)]
pub struct Modulus {
	handle: *mut c_void,
}

unsafe impl Sync for Modulus {}
unsafe impl Send for Modulus {}

impl Modulus {
	/// Wraps a handle owned by this `Modulus` without copying it.
	pub(crate) fn from_handle(handle: *mut c_void) -> Self {
		Self { handle }
	}

	/// Creates a `Modulus` from a 64-bit prime value.
	pub fn new(value: u64) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::Modulus_Create1(value, &mut handle) })?;

		Ok(Self { handle })
	}

	/// Returns the handle to the underlying SEAL object.
	pub fn get_handle(&self) -> *mut c_void {
		self.handle
	}

	/// Returns the value of this modulus.
	pub fn value(&self) -> u64 {
		let mut value: u64 = 0;

		convert_seal_error(unsafe { bindgen::Modulus_Value(self.handle, &mut value) })
			.expect("Internal error in Modulus::value().");

		value
	}

	/// Returns the number of significant bits of this modulus.
	pub fn bit_count(&self) -> i32 {
		let mut bits: i32 = 0;

		convert_seal_error(unsafe { bindgen::Modulus_BitCount(self.handle, &mut bits) })
			.expect("Internal error in Modulus::bit_count().");

		bits
	}
}

impl Clone for Modulus {
	fn clone(&self) -> Self {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::Modulus_Create2(self.handle, &mut handle) })
			.expect("Internal error: Failed to copy modulus.");

		Self { handle }
	}
}

impl Drop for Modulus {
	fn drop(&mut self) {
		convert_seal_error(unsafe { bindgen::Modulus_Destroy(self.handle) })
			.expect("Internal error in Modulus::drop().");
	}
}

/// Wraps a raw, borrowed SEAL `Modulus*` handle without taking ownership.
///
/// Callers must either `forget` the result or clone it before it drops;
/// used where SEAL hands back a pointer into data it still owns.
pub(crate) unsafe fn unchecked_from_handle(handle: *mut c_void) -> Modulus {
	Modulus::from_handle(handle)
}

/// The security level enforced by the HomomorphicEncryption.org standard.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecurityLevel {
	/// No enforced security level. Only for testing.
	None = 0,
	/// 128 bits of security.
	TC128 = 128,
	/// 192 bits of security.
	TC192 = 192,
	/// 256 bits of security.
	TC256 = 256,
}

/// Builds coefficient modulus chains for a given polynomial degree.
pub struct CoefficientModulus;

impl CoefficientModulus {
	/// Returns a chain of primes, one per entry in `bit_sizes`, suitable as
	/// the coefficient modulus for a scheme with the given `poly_modulus_degree`.
	pub fn create(degree: DegreeType, bit_sizes: &[i32]) -> Result<Vec<Modulus>> {
		let mut handles: Vec<*mut c_void> = vec![null_mut(); bit_sizes.len()];

		convert_seal_error(unsafe {
			bindgen::CoeffModulus_Create(
				u64::from(degree),
				bit_sizes.len() as u64,
				bit_sizes.as_ptr() as *mut i32,
				handles.as_mut_ptr(),
			)
		})?;

		Ok(handles.into_iter().map(Modulus::from_handle).collect())
	}

	/// Returns the maximum bit count coefficient modulus for the given
	/// polynomial degree and security level.
	pub fn max_bit_count(degree: DegreeType, security_level: SecurityLevel) -> i32 {
		let mut bits: i32 = 0;

		convert_seal_error(unsafe {
			bindgen::CoeffModulus_MaxBitCount(u64::from(degree), security_level as i32, &mut bits)
		})
		.expect("Internal error in CoefficientModulus::max_bit_count().");

		bits
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn can_create_coefficient_modulus() {
		let modulus = CoefficientModulus::create(DegreeType::D1024, &[60, 40, 40, 60]).unwrap();

		assert_eq!(modulus.len(), 4);
	}
}
