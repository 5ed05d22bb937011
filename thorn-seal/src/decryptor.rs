use std::{
	ffi::c_void,
	ptr::null_mut,
	sync::atomic::{AtomicPtr, Ordering},
};

use crate::{bindgen, error::Result, try_seal, Ciphertext, Context, Plaintext, SecretKey};

/// Decrypts [`Ciphertext`]s into [`Plaintext`]s, and reports the invariant
/// noise budget remaining in a ciphertext. Requires the secret key.
pub struct Decryptor {
	handle: AtomicPtr<c_void>,
}

unsafe impl Sync for Decryptor {}
unsafe impl Send for Decryptor {}

impl Decryptor {
	/// Creates a decryptor bound to `ctx` and `secret_key`.
	pub fn new(ctx: &Context, secret_key: &SecretKey) -> Result<Self> {
		let mut handle = null_mut();

		try_seal!(unsafe {
			bindgen::Decryptor_Create(ctx.get_handle(), secret_key.get_handle(), &mut handle)
		})?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}

	/// Decrypts `ciphertext`.
	pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Plaintext> {
		let plaintext = Plaintext::new()?;

		try_seal!(unsafe {
			bindgen::Decryptor_Decrypt(self.get_handle(), ciphertext.get_handle(), plaintext.get_handle())
		})?;

		Ok(plaintext)
	}

	/// Returns the invariant noise budget (in bits) remaining in
	/// `ciphertext`; decryption fails once this reaches zero.
	pub fn invariant_noise_budget(&self, ciphertext: &Ciphertext) -> Result<u32> {
		let mut noise: i32 = 0;

		try_seal!(unsafe {
			bindgen::Decryptor_InvariantNoiseBudget(self.get_handle(), ciphertext.get_handle(), &mut noise)
		})?;

		Ok(noise as u32)
	}
}

impl Drop for Decryptor {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::Decryptor_Destroy(self.get_handle()) })
			.expect("Internal error in Decryptor::drop().");
	}
}

#[cfg(test)]
mod tests {
	use crate::*;

	#[test]
	fn can_create_and_drop_decryptor() {
		let modulus = CoefficientModulus::create(DegreeType::D8192, &[60, 40, 40, 60]).unwrap();
		let params = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(DegreeType::D8192)
			.set_coefficient_modulus(modulus)
			.build()
			.unwrap();
		let ctx = Context::new(&params, true, SecurityLevel::TC128).unwrap();
		let keygen = KeyGenerator::new(&ctx).unwrap();

		let decryptor = Decryptor::new(&ctx, &keygen.secret_key()).unwrap();

		std::mem::drop(decryptor);
	}
}
