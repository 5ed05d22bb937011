use std::ffi::c_void;
use std::fmt::Debug;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::*;
use crate::serialization::CompressionType;
use crate::{bindgen, try_seal, Context, FromBytes, ToBytes};

/// Generates matching secret/public keys and, on request, the auxiliary
/// relinearization and Galois keys evaluation needs for multiplication depth
/// and slot rotation.
#[derive(Debug)]
pub struct KeyGenerator {
	handle: *mut c_void,
	secret_key: SecretKey,
}

unsafe impl Sync for KeyGenerator {}
unsafe impl Send for KeyGenerator {}

impl KeyGenerator {
	/// Creates a key generator bound to `ctx`, generating a fresh secret key.
	pub fn new(ctx: &Context) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KeyGenerator_Create(ctx.get_handle(), &mut handle) })?;

		let secret_key = Self::read_secret_key(handle)?;

		Ok(Self { handle, secret_key })
	}

	/// Creates a key generator bound to `ctx`, reusing a previously generated
	/// secret key instead of minting a new one.
	pub fn new_from_secret_key(ctx: &Context, secret_key: &SecretKey) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe {
			bindgen::KeyGenerator_Create1(ctx.get_handle(), secret_key.get_handle(), &mut handle)
		})?;

		Ok(Self {
			handle,
			secret_key: secret_key.clone(),
		})
	}

	fn read_secret_key(keygen_handle: *mut c_void) -> Result<SecretKey> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KeyGenerator_SecretKey(keygen_handle, &mut handle) })?;

		Ok(SecretKey {
			handle: AtomicPtr::new(handle),
		})
	}

	/// Returns a copy of the secret key this generator was created with.
	pub fn secret_key(&self) -> SecretKey {
		self.secret_key.clone()
	}

	/// Generates a new public key matching this generator's secret key.
	pub fn create_public_key(&self) -> PublicKey {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KeyGenerator_CreatePublicKey(self.handle, false, &mut handle) })
			.expect("Internal error in KeyGenerator::create_public_key().");

		PublicKey {
			handle: AtomicPtr::new(handle),
		}
	}

	/// Generates relinearization keys, required to bring a post-multiply
	/// ciphertext's polynomial count back down to 2.
	pub fn create_relinearization_keys(&self) -> Result<RelinearizationKey> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KeyGenerator_CreateRelinKeys(self.handle, false, &mut handle) })?;

		Ok(RelinearizationKey {
			handle: AtomicPtr::new(handle),
		})
	}

	/// Generates Galois keys, required for `rotate_rows`/`rotate_columns`.
	pub fn create_galois_keys(&self) -> Result<GaloisKey> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KeyGenerator_CreateGaloisKeys(self.handle, false, &mut handle) })?;

		Ok(GaloisKey {
			handle: AtomicPtr::new(handle),
		})
	}
}

impl Drop for KeyGenerator {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::KeyGenerator_Destroy(self.handle) })
			.expect("Internal error in KeyGenerator::drop().");
	}
}

/// The public half of a CKKS key pair. Required to construct an
/// [`crate::Encryptor`] for asymmetric encryption.
pub struct PublicKey {
	handle: AtomicPtr<c_void>,
}

unsafe impl Sync for PublicKey {}
unsafe impl Send for PublicKey {}

impl PublicKey {
	/// Creates an empty public key, to be populated via [`FromBytes::from_bytes`].
	pub fn new() -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::PublicKey_Create(&mut handle) })?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}
}

impl Debug for PublicKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PublicKey").field("handle", &self.handle).finish()
	}
}

impl Clone for PublicKey {
	fn clone(&self) -> Self {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::PublicKey_Create1(self.get_handle(), &mut handle) })
			.expect("Fatal error cloning public key.");

		Self {
			handle: AtomicPtr::new(handle),
		}
	}
}

impl PartialEq for PublicKey {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes().ok() == other.as_bytes().ok()
	}
}

impl ToBytes for PublicKey {
	fn as_bytes(&self) -> Result<Vec<u8>> {
		let mut num_bytes: i64 = 0;

		try_seal!(unsafe {
			bindgen::PublicKey_SaveSize(self.get_handle(), CompressionType::ZStd as u8, &mut num_bytes)
		})?;

		let mut data: Vec<u8> = Vec::with_capacity(num_bytes as usize);
		let mut bytes_written: i64 = 0;

		try_seal!(unsafe {
			bindgen::PublicKey_Save(
				self.get_handle(),
				data.as_mut_ptr(),
				num_bytes as u64,
				CompressionType::ZStd as u8,
				&mut bytes_written,
			)
		})?;

		unsafe { data.set_len(bytes_written as usize) };

		Ok(data)
	}
}

impl FromBytes for PublicKey {
	type State = Context;

	fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
		let key = Self::new()?;
		let mut bytes_read = 0i64;

		try_seal!(unsafe {
			bindgen::PublicKey_Load(
				key.get_handle(),
				context.get_handle(),
				bytes.as_ptr() as *mut u8,
				bytes.len() as u64,
				&mut bytes_read,
			)
		})?;

		Ok(key)
	}
}

impl Drop for PublicKey {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::PublicKey_Destroy(self.get_handle()) })
			.expect("Internal error in PublicKey::drop().");
	}
}

/// The secret half of a CKKS key pair. Required to decrypt, and to construct
/// an [`crate::Encryptor`] for symmetric encryption.
pub struct SecretKey {
	handle: AtomicPtr<c_void>,
}

unsafe impl Sync for SecretKey {}
unsafe impl Send for SecretKey {}

impl SecretKey {
	/// Creates an empty secret key, to be populated via [`FromBytes::from_bytes`].
	pub fn new() -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::SecretKey_Create(&mut handle) })?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}
}

impl Debug for SecretKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretKey").finish_non_exhaustive()
	}
}

impl Clone for SecretKey {
	fn clone(&self) -> Self {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::SecretKey_Create1(self.get_handle(), &mut handle) })
			.expect("Fatal error cloning secret key.");

		Self {
			handle: AtomicPtr::new(handle),
		}
	}
}

impl PartialEq for SecretKey {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes().ok() == other.as_bytes().ok()
	}
}

impl ToBytes for SecretKey {
	fn as_bytes(&self) -> Result<Vec<u8>> {
		let mut num_bytes: i64 = 0;

		try_seal!(unsafe {
			bindgen::SecretKey_SaveSize(self.get_handle(), CompressionType::ZStd as u8, &mut num_bytes)
		})?;

		let mut data: Vec<u8> = Vec::with_capacity(num_bytes as usize);
		let mut bytes_written: i64 = 0;

		try_seal!(unsafe {
			bindgen::SecretKey_Save(
				self.get_handle(),
				data.as_mut_ptr(),
				num_bytes as u64,
				CompressionType::ZStd as u8,
				&mut bytes_written,
			)
		})?;

		unsafe { data.set_len(bytes_written as usize) };

		Ok(data)
	}
}

impl FromBytes for SecretKey {
	type State = Context;

	fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
		let key = Self::new()?;
		let mut bytes_read = 0i64;

		try_seal!(unsafe {
			bindgen::SecretKey_Load(
				key.get_handle(),
				context.get_handle(),
				bytes.as_ptr() as *mut u8,
				bytes.len() as u64,
				&mut bytes_read,
			)
		})?;

		Ok(key)
	}
}

impl Drop for SecretKey {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::SecretKey_Destroy(self.get_handle()) })
			.expect("Internal error in SecretKey::drop().");
	}
}

/// Key switching material letting [`crate::Evaluator::relinearize`] collapse
/// a post-multiply ciphertext back down to 2 polynomials.
pub struct RelinearizationKey {
	handle: AtomicPtr<c_void>,
}

unsafe impl Sync for RelinearizationKey {}
unsafe impl Send for RelinearizationKey {}

impl RelinearizationKey {
	/// Creates an empty relinearization key, to be populated via [`FromBytes::from_bytes`].
	pub fn new() -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KSwitchKeys_Create(&mut handle) })?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}
}

impl Debug for RelinearizationKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RelinearizationKey").field("handle", &self.handle).finish()
	}
}

impl PartialEq for RelinearizationKey {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes().ok() == other.as_bytes().ok()
	}
}

impl ToBytes for RelinearizationKey {
	fn as_bytes(&self) -> Result<Vec<u8>> {
		let mut num_bytes: i64 = 0;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_SaveSize(self.get_handle(), CompressionType::ZStd as u8, &mut num_bytes)
		})?;

		let mut data: Vec<u8> = Vec::with_capacity(num_bytes as usize);
		let mut bytes_written: i64 = 0;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_Save(
				self.get_handle(),
				data.as_mut_ptr(),
				num_bytes as u64,
				CompressionType::ZStd as u8,
				&mut bytes_written,
			)
		})?;

		unsafe { data.set_len(bytes_written as usize) };

		Ok(data)
	}
}

impl FromBytes for RelinearizationKey {
	type State = Context;

	fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
		let key = Self::new()?;
		let mut bytes_read = 0i64;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_Load(
				key.get_handle(),
				context.get_handle(),
				bytes.as_ptr() as *mut u8,
				bytes.len() as u64,
				&mut bytes_read,
			)
		})?;

		Ok(key)
	}
}

impl Drop for RelinearizationKey {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::KSwitchKeys_Destroy(self.get_handle()) })
			.expect("Internal error in RelinearizationKey::drop().");
	}
}

/// Key switching material letting [`crate::Evaluator::rotate_rows`] and
/// [`crate::Evaluator::rotate_columns`] cyclically permute packed slots.
pub struct GaloisKey {
	handle: AtomicPtr<c_void>,
}

unsafe impl Sync for GaloisKey {}
unsafe impl Send for GaloisKey {}

impl GaloisKey {
	/// Creates an empty Galois key, to be populated via [`FromBytes::from_bytes`].
	pub fn new() -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		try_seal!(unsafe { bindgen::KSwitchKeys_Create(&mut handle) })?;

		Ok(Self {
			handle: AtomicPtr::new(handle),
		})
	}

	pub(crate) unsafe fn get_handle(&self) -> *mut c_void {
		self.handle.load(Ordering::SeqCst)
	}
}

impl Debug for GaloisKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GaloisKey").field("handle", &self.handle).finish()
	}
}

impl PartialEq for GaloisKey {
	fn eq(&self, other: &Self) -> bool {
		self.as_bytes().ok() == other.as_bytes().ok()
	}
}

impl ToBytes for GaloisKey {
	fn as_bytes(&self) -> Result<Vec<u8>> {
		let mut num_bytes: i64 = 0;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_SaveSize(self.get_handle(), CompressionType::ZStd as u8, &mut num_bytes)
		})?;

		let mut data: Vec<u8> = Vec::with_capacity(num_bytes as usize);
		let mut bytes_written: i64 = 0;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_Save(
				self.get_handle(),
				data.as_mut_ptr(),
				num_bytes as u64,
				CompressionType::ZStd as u8,
				&mut bytes_written,
			)
		})?;

		unsafe { data.set_len(bytes_written as usize) };

		Ok(data)
	}
}

impl FromBytes for GaloisKey {
	type State = Context;

	fn from_bytes(context: &Context, bytes: &[u8]) -> Result<Self> {
		let key = Self::new()?;
		let mut bytes_read = 0i64;

		try_seal!(unsafe {
			bindgen::KSwitchKeys_Load(
				key.get_handle(),
				context.get_handle(),
				bytes.as_ptr() as *mut u8,
				bytes.len() as u64,
				&mut bytes_read,
			)
		})?;

		Ok(key)
	}
}

impl Drop for GaloisKey {
	fn drop(&mut self) {
		try_seal!(unsafe { bindgen::KSwitchKeys_Destroy(self.get_handle()) })
			.expect("Internal error in GaloisKey::drop().");
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
	fn can_generate_keys() {
		let ctx = make_context();
		let keygen = KeyGenerator::new(&ctx).unwrap();

		let _public = keygen.create_public_key();
		let _secret = keygen.secret_key();
		let _relin = keygen.create_relinearization_keys().unwrap();
		let _galois = keygen.create_galois_keys().unwrap();
	}

	#[test]
	fn secret_key_round_trips_through_bytes() {
		let ctx = make_context();
		let keygen = KeyGenerator::new(&ctx).unwrap();
		let secret = keygen.secret_key();

		let bytes = secret.as_bytes().unwrap();
		let restored = SecretKey::from_bytes(&ctx, &bytes).unwrap();

		assert_eq!(secret, restored);
	}

	#[test]
	fn keygen_from_existing_secret_key_reuses_it() {
		let ctx = make_context();
		let keygen = KeyGenerator::new(&ctx).unwrap();
		let secret = keygen.secret_key();

		let keygen2 = KeyGenerator::new_from_secret_key(&ctx, &secret).unwrap();

		assert_eq!(secret, keygen2.secret_key());
	}
}
