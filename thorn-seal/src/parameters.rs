use std::ffi::c_void;
use std::mem::forget;
use std::ptr::null_mut;

use serde::{Deserialize, Serialize};

use crate::bindgen;
use crate::error::{convert_seal_error, Error, Result};
use crate::modulus::unchecked_from_handle;
use crate::Modulus;

/// The FHE scheme implemented by a set of encryption parameters.
///
/// Only `Ckks` is constructible through [`CkksEncryptionParametersBuilder`];
/// the variant still models the full on-the-wire scheme tag SEAL reports.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeType {
	/// No scheme. Never produced by a builder.
	None = 0x0,
	/// Cheon-Kim-Kim-Song scheme.
	Ckks = 0x2,
}

impl SchemeType {
	fn from_u8(val: u8) -> Self {
		match val {
			0x2 => SchemeType::Ckks,
			_ => SchemeType::None,
		}
	}
}

/// An immutable collection of parameters that defines a CKKS instance:
/// polynomial modulus degree and coefficient modulus chain.
///
/// Construct one through [`CkksEncryptionParametersBuilder`]; once built,
/// an `EncryptionParameters` is effectively a value type passed to
/// [`crate::Context::new`].
#[derive(Debug)]
pub struct EncryptionParameters {
	pub(crate) handle: *mut c_void,
}

unsafe impl Sync for EncryptionParameters {}
unsafe impl Send for EncryptionParameters {}

impl EncryptionParameters {
	fn new(scheme: SchemeType) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::EncParams_Create1(scheme as u8, &mut handle) })?;

		Ok(Self { handle })
	}

	/// The number of 64-bit words in a parms_id hash. Fixed by SEAL.
	pub const fn block_size() -> u8 {
		4
	}

	/// Returns the handle to the underlying SEAL object.
	pub fn get_handle(&self) -> *mut c_void {
		self.handle
	}

	/// Returns the polynomial modulus degree.
	pub fn get_poly_modulus_degree(&self) -> u64 {
		let mut degree: u64 = 0;

		convert_seal_error(unsafe {
			bindgen::EncParams_GetPolyModulusDegree(self.handle, &mut degree)
		})
		.expect("Internal error");

		degree
	}

	/// Returns the scheme these parameters were built for.
	pub fn get_scheme(&self) -> SchemeType {
		let mut scheme: u8 = 0;

		convert_seal_error(unsafe { bindgen::EncParams_GetScheme(self.handle, &mut scheme) })
			.expect("Internal error");

		SchemeType::from_u8(scheme)
	}

	/// Returns the coefficient modulus chain.
	pub fn get_coefficient_modulus(&self) -> Vec<Modulus> {
		let mut len: u64 = 0;

		convert_seal_error(unsafe {
			bindgen::EncParams_GetCoeffModulus(self.handle, &mut len, null_mut())
		})
		.expect("Internal error");

		let mut borrowed = Vec::with_capacity(len as usize);
		let borrowed_ptr = borrowed.as_mut_ptr();

		unsafe {
			convert_seal_error(bindgen::EncParams_GetCoeffModulus(
				self.handle,
				&mut len,
				borrowed_ptr,
			))
			.expect("Internal error");

			borrowed.set_len(len as usize);
		};

		borrowed
			.iter()
			.map(|h| {
				let modulus = unsafe { unchecked_from_handle(*h) };
				let ret = modulus.clone();
				forget(modulus);
				ret
			})
			.collect()
	}

	fn set_coefficient_modulus(&mut self, modulus: &[Modulus]) -> Result<()> {
		let modulus_ref = modulus.iter().map(|m| m.get_handle()).collect::<Vec<_>>();
		let modulus_ptr = modulus_ref.as_ptr() as *mut *mut c_void;

		convert_seal_error(unsafe {
			bindgen::EncParams_SetCoeffModulus(self.handle, modulus.len() as u64, modulus_ptr)
		})
	}

	fn set_poly_modulus_degree(&mut self, degree: u64) -> Result<()> {
		convert_seal_error(unsafe { bindgen::EncParams_SetPolyModulusDegree(self.handle, degree) })
	}
}

impl Drop for EncryptionParameters {
	fn drop(&mut self) {
		convert_seal_error(unsafe { bindgen::EncParams_Destroy(self.handle) })
			.expect("Internal error in EncryptionParameters::drop().");
	}
}

#[derive(Debug, PartialEq)]
enum CoefficientModulusType {
	NotSet,
	Modulus(Vec<Modulus>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum ModulusDegreeType {
	NotSet,
	Constant(DegreeType),
}

impl TryFrom<ModulusDegreeType> for u64 {
	type Error = Error;

	fn try_from(value: ModulusDegreeType) -> Result<Self> {
		match value {
			ModulusDegreeType::NotSet => Err(Error::DegreeNotSet),
			ModulusDegreeType::Constant(degree) => Ok(degree.into()),
		}
	}
}

/// Supported polynomial modulus degrees. Larger degrees admit a deeper
/// modulus chain (more multiplicative levels) at the cost of performance.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegreeType {
	D1024,
	D2048,
	D4096,
	D8192,
	D16384,
	D32768,
}

impl From<DegreeType> for u64 {
	fn from(value: DegreeType) -> Self {
		match value {
			DegreeType::D1024 => 1024,
			DegreeType::D2048 => 2048,
			DegreeType::D4096 => 4096,
			DegreeType::D8192 => 8192,
			DegreeType::D16384 => 16384,
			DegreeType::D32768 => 32768,
		}
	}
}

impl TryFrom<u64> for DegreeType {
	type Error = Error;

	fn try_from(value: u64) -> Result<Self> {
		match value {
			1024 => Ok(DegreeType::D1024),
			2048 => Ok(DegreeType::D2048),
			4096 => Ok(DegreeType::D4096),
			8192 => Ok(DegreeType::D8192),
			16384 => Ok(DegreeType::D16384),
			32768 => Ok(DegreeType::D32768),
			_ => Err(Error::DegreeNotSet),
		}
	}
}

/// Builds a CKKS [`EncryptionParameters`] instance.
///
/// The parameters (poly modulus degree, coefficient modulus) decide the
/// number of usable levels in the modulus chain and the security margin;
/// this builder only validates that both are set before constructing SEAL's
/// native object.
pub struct CkksEncryptionParametersBuilder {
	poly_modulus_degree: ModulusDegreeType,
	coefficient_modulus: CoefficientModulusType,
}

impl CkksEncryptionParametersBuilder {
	/// Creates a new, empty builder.
	pub fn new() -> Self {
		Self {
			poly_modulus_degree: ModulusDegreeType::NotSet,
			coefficient_modulus: CoefficientModulusType::NotSet,
		}
	}

	/// Sets the polynomial modulus degree, i.e. the number of plaintext slots.
	pub fn set_poly_modulus_degree(mut self, degree: DegreeType) -> Self {
		self.poly_modulus_degree = ModulusDegreeType::Constant(degree);
		self
	}

	/// Sets the coefficient modulus chain. Its length determines the number
	/// of multiplicative levels available before the chain is exhausted.
	pub fn set_coefficient_modulus(mut self, modulus: Vec<Modulus>) -> Self {
		self.coefficient_modulus = CoefficientModulusType::Modulus(modulus);
		self
	}

	/// Validates the parameter choices and constructs the SEAL object.
	pub fn build(self) -> Result<EncryptionParameters> {
		let mut params = EncryptionParameters::new(SchemeType::Ckks)?;

		params.set_poly_modulus_degree(self.poly_modulus_degree.try_into()?)?;

		match self.coefficient_modulus {
			CoefficientModulusType::NotSet => return Err(Error::CoefficientModulusNotSet),
			CoefficientModulusType::Modulus(m) => params.set_coefficient_modulus(&m)?,
		};

		Ok(params)
	}
}

impl Default for CkksEncryptionParametersBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use crate::*;

	#[test]
	fn can_build_ckks_params() {
		let modulus_chain =
			CoefficientModulus::create(DegreeType::D8192, &[50, 30, 30, 50, 50]).unwrap();

		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(DegreeType::D8192)
			.set_coefficient_modulus(modulus_chain)
			.build()
			.unwrap();

		assert_eq!(params.get_poly_modulus_degree(), 8192);
		assert_eq!(params.get_scheme(), SchemeType::Ckks);
		assert_eq!(params.get_coefficient_modulus().len(), 5);
	}

	#[test]
	fn build_fails_without_coefficient_modulus() {
		let err = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(DegreeType::D8192)
			.build()
			.unwrap_err();

		assert_eq!(err, Error::CoefficientModulusNotSet);
	}
}
