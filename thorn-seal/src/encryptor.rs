use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::null_mut;

use crate::bindgen;
use crate::error::*;
use crate::{Ciphertext, Context, Plaintext, PublicKey, SecretKey};

/// Encrypts [`Plaintext`]s into [`Ciphertext`]s.
///
/// Constructing an `Encryptor` requires a [`Context`] and at least one of a
/// public key (asymmetric encryption) or a secret key (symmetric
/// encryption); `T` is a marker type tracking which operations are legal on
/// the resulting instance so the wrong key/operation pairing is a compile
/// error rather than a runtime one.
pub struct Encryptor<T = ()> {
	handle: *mut c_void,
	_marker: PhantomData<T>,
}

/// An encryptor capable only of symmetric encryption.
pub type SymmetricEncryptor = Encryptor<Sym>;

/// An encryptor capable only of asymmetric encryption.
pub type AsymmetricEncryptor = Encryptor<Asym>;

/// An encryptor capable of both symmetric and asymmetric encryption.
pub type SymAsymEncryptor = Encryptor<SymAsym>;

mod sealed {
	pub trait Sealed {}
	impl Sealed for super::Sym {}
	impl Sealed for super::Asym {}
	impl Sealed for super::SymAsym {}
}

/// Marker traits signifying which encryption modes an [`Encryptor`] supports.
pub mod marker {
	/// Supports symmetric encryption.
	pub trait Sym: super::sealed::Sealed {}
	/// Supports asymmetric encryption.
	pub trait Asym: super::sealed::Sealed {}
}

/// Marks an [`Encryptor`] as symmetric-only.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Sym;
impl marker::Sym for Sym {}

/// Marks an [`Encryptor`] as asymmetric-only.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Asym;
impl marker::Asym for Asym {}

/// Marks an [`Encryptor`] as supporting both modes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SymAsym;
impl marker::Sym for SymAsym {}
impl marker::Asym for SymAsym {}

unsafe impl<T: Sync> Sync for Encryptor<T> {}
unsafe impl<T: Send> Send for Encryptor<T> {}

impl Encryptor {
	/// Creates an encryptor supporting both symmetric and asymmetric
	/// encryption.
	pub fn with_public_and_secret_key(
		ctx: &Context,
		public_key: &PublicKey,
		secret_key: &SecretKey,
	) -> Result<SymAsymEncryptor> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::Encryptor_Create(
				ctx.get_handle(),
				public_key.get_handle(),
				secret_key.get_handle(),
				&mut handle,
			)
		})?;

		Ok(Encryptor {
			handle,
			_marker: PhantomData,
		})
	}

	/// Creates an encryptor supporting only asymmetric encryption.
	pub fn with_public_key(ctx: &Context, public_key: &PublicKey) -> Result<AsymmetricEncryptor> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::Encryptor_Create(ctx.get_handle(), public_key.get_handle(), null_mut(), &mut handle)
		})?;

		Ok(Encryptor {
			handle,
			_marker: PhantomData,
		})
	}

	/// Creates an encryptor supporting only symmetric encryption.
	pub fn with_secret_key(ctx: &Context, secret_key: &SecretKey) -> Result<SymmetricEncryptor> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe {
			bindgen::Encryptor_Create(ctx.get_handle(), null_mut(), secret_key.get_handle(), &mut handle)
		})?;

		Ok(Encryptor {
			handle,
			_marker: PhantomData,
		})
	}
}

impl AsymmetricEncryptor {
	/// Creates a new asymmetric-only encryptor.
	pub fn new(ctx: &Context, public_key: &PublicKey) -> Result<Self> {
		Encryptor::with_public_key(ctx, public_key)
	}
}

impl SymmetricEncryptor {
	/// Creates a new symmetric-only encryptor.
	pub fn new(ctx: &Context, secret_key: &SecretKey) -> Result<Self> {
		Encryptor::with_secret_key(ctx, secret_key)
	}
}

impl SymAsymEncryptor {
	/// Creates a new encryptor capable of both symmetric and asymmetric
	/// encryption.
	pub fn new(ctx: &Context, public_key: &PublicKey, secret_key: &SecretKey) -> Result<Self> {
		Encryptor::with_public_and_secret_key(ctx, public_key, secret_key)
	}
}

impl<T: marker::Asym> Encryptor<T> {
	/// Encrypts `plaintext` with the public key. The resulting ciphertext's
	/// parms_id matches the plaintext's encryption level.
	pub fn encrypt(&self, plaintext: &Plaintext) -> Result<Ciphertext> {
		let ciphertext = Ciphertext::new()?;

		convert_seal_error(unsafe {
			bindgen::Encryptor_Encrypt(self.handle, plaintext.get_handle(), ciphertext.get_handle(), null_mut())
		})?;

		Ok(ciphertext)
	}
}

impl<T: marker::Sym> Encryptor<T> {
	/// Encrypts `plaintext` with the secret key. The resulting ciphertext's
	/// parms_id matches the plaintext's encryption level.
	pub fn encrypt_symmetric(&self, plaintext: &Plaintext) -> Result<Ciphertext> {
		let ciphertext = Ciphertext::new()?;

		convert_seal_error(unsafe {
			bindgen::Encryptor_EncryptSymmetric(
				self.handle,
				plaintext.get_handle(),
				false,
				ciphertext.get_handle(),
				null_mut(),
			)
		})?;

		Ok(ciphertext)
	}
}

impl<T> Drop for Encryptor<T> {
	fn drop(&mut self) {
		convert_seal_error(unsafe { bindgen::Encryptor_Destroy(self.handle) })
			.expect("Internal error in Encryptor::drop().");
	}
}

#[cfg(test)]
mod tests {
	use crate::*;

	fn make_context() -> Context {
		let modulus = CoefficientModulus::create(DegreeType::D8192, &[60, 40, 40, 60]).unwrap();
		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(DegreeType::D8192)
			.set_coefficient_modulus(modulus)
			.build()
			.unwrap();

		Context::new(&params, true, SecurityLevel::TC128).unwrap()
	}

	#[test]
	fn can_encrypt_and_decrypt_round_trip() {
		let ctx = make_context();
		let keygen = KeyGenerator::new(&ctx).unwrap();
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();

		let public_key = keygen.create_public_key();
		let secret_key = keygen.secret_key();

		let encryptor = Encryptor::with_public_key(&ctx, &public_key).unwrap();
		let decryptor = Decryptor::new(&ctx, &secret_key).unwrap();

		let data: Vec<f64> = (0..encoder.get_slot_count()).map(|i| i as f64).collect();
		let plaintext = encoder.encode_f64(&data).unwrap();
		let ciphertext = encryptor.encrypt(&plaintext).unwrap();
		let decrypted = decryptor.decrypt(&ciphertext).unwrap();
		let decoded = encoder.decode_f64(&decrypted).unwrap();

		for (a, b) in data.into_iter().zip(decoded) {
			assert!((a - b).abs() < 0.0001);
		}
	}
}
