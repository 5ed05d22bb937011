use std::ffi::c_void;
use std::ptr::null_mut;

use crate::error::*;
use crate::{bindgen, Ciphertext, Context, GaloisKey, Plaintext, RelinearizationKey};

/// Homomorphic operations over [`Ciphertext`]/[`Plaintext`] values. One
/// method pair (`_inplace` and value-returning) per SEAL evaluator
/// operation; CKKS adds `relinearize`/`rotate_rows`/`rotate_columns` plus
/// the modulus-chain primitives (`rescale_to_next`, `mod_switch_to_next`,
/// `mod_switch_to`) on top of the scheme-agnostic arithmetic.
pub trait Evaluator {
	/// The plaintext type this evaluator operates on.
	type Plaintext;
	/// The ciphertext type this evaluator operates on.
	type Ciphertext;

	/// Negates `a` in place.
	fn negate_inplace(&self, a: &mut Self::Ciphertext) -> Result<()>;
	/// Returns the negation of `a`.
	fn negate(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;

	/// Adds `b` into `a`.
	fn add_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<()>;
	/// Returns `a + b`.
	fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
	/// Sums a slice of ciphertexts.
	fn add_many(&self, a: &[Self::Ciphertext]) -> Result<Self::Ciphertext>;

	/// Multiplies a slice of ciphertexts in a depth-optimal tree,
	/// relinearizing after every multiplication.
	fn multiply_many(
		&self,
		a: &[Self::Ciphertext],
		relin_keys: &RelinearizationKey,
	) -> Result<Self::Ciphertext>;

	/// Subtracts `b` from `a` in place.
	fn sub_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<()>;
	/// Returns `a - b`.
	fn sub(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

	/// Multiplies `a` by `b` in place.
	fn multiply_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<()>;
	/// Returns `a * b`.
	fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

	/// Squares `a` in place.
	fn square_inplace(&self, a: &mut Self::Ciphertext) -> Result<()>;
	/// Returns `a^2`.
	fn square(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;

	/// Drops the last prime of `a`'s coefficient modulus, moving it one
	/// step down the chain without changing its scale.
	fn mod_switch_to_next(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::mod_switch_to_next`].
	fn mod_switch_to_next_inplace(&self, a: &mut Self::Ciphertext) -> Result<()>;
	/// Plaintext form of [`Evaluator::mod_switch_to_next`].
	fn mod_switch_to_next_plaintext(&self, a: &Self::Plaintext) -> Result<Self::Plaintext>;
	/// In-place plaintext form of [`Evaluator::mod_switch_to_next`].
	fn mod_switch_to_next_inplace_plaintext(&self, a: &mut Self::Plaintext) -> Result<()>;

	/// Mod-switches `a` directly to the level identified by `parms_id`,
	/// which must be at or below `a`'s current level.
	fn mod_switch_to(&self, a: &Self::Ciphertext, parms_id: &[u64]) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::mod_switch_to`].
	fn mod_switch_to_inplace(&self, a: &mut Self::Ciphertext, parms_id: &[u64]) -> Result<()>;

	/// Divides `a`'s scale by the last prime of its coefficient modulus and
	/// drops that prime, restoring the scale to roughly its pre-multiply
	/// value. CKKS-specific: has no BFV counterpart.
	fn rescale_to_next(&self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::rescale_to_next`].
	fn rescale_to_next_inplace(&self, a: &mut Self::Ciphertext) -> Result<()>;

	/// Raises `a` to `exponent`, relinearizing after each multiplication.
	fn exponentiate(
		&self,
		a: &Self::Ciphertext,
		exponent: u64,
		relin_keys: &RelinearizationKey,
	) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::exponentiate`].
	fn exponentiate_inplace(
		&self,
		a: &mut Self::Ciphertext,
		exponent: u64,
		relin_keys: &RelinearizationKey,
	) -> Result<()>;

	/// Adds ciphertext `a` and plaintext `b`.
	fn add_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::add_plain`].
	fn add_plain_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Plaintext) -> Result<()>;

	/// Subtracts plaintext `b` from ciphertext `a`.
	fn sub_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::sub_plain`].
	fn sub_plain_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Plaintext) -> Result<()>;

	/// Multiplies ciphertext `a` by plaintext `b`.
	fn multiply_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::multiply_plain`].
	fn multiply_plain_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Plaintext) -> Result<()>;

	/// Relinearizes `a`, reducing its polynomial count back to 2.
	fn relinearize(&self, a: &Self::Ciphertext, relin_keys: &RelinearizationKey) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::relinearize`].
	fn relinearize_inplace(&self, a: &mut Self::Ciphertext, relin_keys: &RelinearizationKey) -> Result<()>;

	/// Cyclically rotates packed slots left (`steps > 0`) or right (`steps < 0`).
	fn rotate_rows(&self, a: &Self::Ciphertext, steps: i32, galois_keys: &GaloisKey) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::rotate_rows`].
	fn rotate_rows_inplace(&self, a: &mut Self::Ciphertext, steps: i32, galois_keys: &GaloisKey) -> Result<()>;

	/// Swaps the two halves of the packed slot vector.
	fn rotate_columns(&self, a: &Self::Ciphertext, galois_keys: &GaloisKey) -> Result<Self::Ciphertext>;
	/// In-place form of [`Evaluator::rotate_columns`].
	fn rotate_columns_inplace(&self, a: &mut Self::Ciphertext, galois_keys: &GaloisKey) -> Result<()>;
}

/// The CKKS evaluator: a thin wrapper over a SEAL `Evaluator*` bound to one
/// [`Context`].
pub struct CKKSEvaluator {
	handle: *mut c_void,
}

unsafe impl Sync for CKKSEvaluator {}
unsafe impl Send for CKKSEvaluator {}

impl CKKSEvaluator {
	/// Creates an evaluator bound to `ctx`.
	pub fn new(ctx: &Context) -> Result<Self> {
		let mut handle: *mut c_void = null_mut();

		convert_seal_error(unsafe { bindgen::Evaluator_Create(ctx.get_handle(), &mut handle) })?;

		Ok(Self { handle })
	}

	fn get_handle(&self) -> *mut c_void {
		self.handle
	}
}

impl Drop for CKKSEvaluator {
	fn drop(&mut self) {
		convert_seal_error(unsafe { bindgen::Evaluator_Destroy(self.handle) })
			.expect("Internal error in CKKSEvaluator::drop().");
	}
}

impl Evaluator for CKKSEvaluator {
	type Plaintext = Plaintext;
	type Ciphertext = Ciphertext;

	fn negate_inplace(&self, a: &mut Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Negate(self.get_handle(), a.get_handle(), a.get_handle())
		})
	}

	fn negate(&self, a: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Negate(self.get_handle(), a.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn add_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Add(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle())
		})
	}

	fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Add(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn add_many(&self, a: &[Ciphertext]) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		let handles: Vec<*mut c_void> = a.iter().map(|c| unsafe { c.get_handle() }).collect();

		convert_seal_error(unsafe {
			bindgen::Evaluator_AddMany(
				self.get_handle(),
				handles.len() as u64,
				handles.as_ptr() as *mut *mut c_void,
				out.get_handle(),
			)
		})?;

		Ok(out)
	}

	fn multiply_many(&self, a: &[Ciphertext], relin_keys: &RelinearizationKey) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		let handles: Vec<*mut c_void> = a.iter().map(|c| unsafe { c.get_handle() }).collect();

		convert_seal_error(unsafe {
			bindgen::Evaluator_MultiplyMany(
				self.get_handle(),
				handles.len() as u64,
				handles.as_ptr() as *mut *mut c_void,
				relin_keys.get_handle(),
				out.get_handle(),
				null_mut(),
			)
		})?;

		Ok(out)
	}

	fn sub_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Sub(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle())
		})
	}

	fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Sub(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn multiply_inplace(&self, a: &mut Ciphertext, b: &Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Multiply(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle(), null_mut())
		})
	}

	fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Multiply(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle(), null_mut())
		})?;
		Ok(out)
	}

	fn square_inplace(&self, a: &mut Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Square(self.get_handle(), a.get_handle(), a.get_handle(), null_mut())
		})
	}

	fn square(&self, a: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Square(self.get_handle(), a.get_handle(), out.get_handle(), null_mut())
		})?;
		Ok(out)
	}

	fn mod_switch_to_next(&self, a: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_ModSwitchToNext1(self.get_handle(), a.get_handle(), out.get_handle(), null_mut())
		})?;
		Ok(out)
	}

	fn mod_switch_to_next_inplace(&self, a: &mut Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_ModSwitchToNext1(self.get_handle(), a.get_handle(), a.get_handle(), null_mut())
		})
	}

	fn mod_switch_to_next_plaintext(&self, a: &Plaintext) -> Result<Plaintext> {
		let out = Plaintext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_ModSwitchToNext2(self.get_handle(), a.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn mod_switch_to_next_inplace_plaintext(&self, a: &mut Plaintext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_ModSwitchToNext2(self.get_handle(), a.get_handle(), a.get_handle())
		})
	}

	fn mod_switch_to(&self, a: &Ciphertext, parms_id: &[u64]) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			let mut parms_id = parms_id.to_vec();
			bindgen::Evaluator_ModSwitchTo1(
				self.get_handle(),
				a.get_handle(),
				parms_id.as_mut_ptr(),
				out.get_handle(),
				null_mut(),
			)
		})?;
		Ok(out)
	}

	fn mod_switch_to_inplace(&self, a: &mut Ciphertext, parms_id: &[u64]) -> Result<()> {
		convert_seal_error(unsafe {
			let mut parms_id = parms_id.to_vec();
			bindgen::Evaluator_ModSwitchTo1(
				self.get_handle(),
				a.get_handle(),
				parms_id.as_mut_ptr(),
				a.get_handle(),
				null_mut(),
			)
		})
	}

	fn rescale_to_next(&self, a: &Ciphertext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_RescaleToNext(self.get_handle(), a.get_handle(), out.get_handle(), null_mut())
		})?;
		Ok(out)
	}

	fn rescale_to_next_inplace(&self, a: &mut Ciphertext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_RescaleToNext(self.get_handle(), a.get_handle(), a.get_handle(), null_mut())
		})
	}

	fn exponentiate(&self, a: &Ciphertext, exponent: u64, relin_keys: &RelinearizationKey) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Exponentiate(
				self.get_handle(),
				a.get_handle(),
				exponent,
				relin_keys.get_handle(),
				out.get_handle(),
				null_mut(),
			)
		})?;
		Ok(out)
	}

	fn exponentiate_inplace(&self, a: &mut Ciphertext, exponent: u64, relin_keys: &RelinearizationKey) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Exponentiate(
				self.get_handle(),
				a.get_handle(),
				exponent,
				relin_keys.get_handle(),
				a.get_handle(),
				null_mut(),
			)
		})
	}

	fn add_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_AddPlain(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn add_plain_inplace(&self, a: &mut Ciphertext, b: &Plaintext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_AddPlain(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle())
		})
	}

	fn sub_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_SubPlain(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle())
		})?;
		Ok(out)
	}

	fn sub_plain_inplace(&self, a: &mut Ciphertext, b: &Plaintext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_SubPlain(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle())
		})
	}

	fn multiply_plain(&self, a: &Ciphertext, b: &Plaintext) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_MultiplyPlain(self.get_handle(), a.get_handle(), b.get_handle(), out.get_handle(), null_mut())
		})?;
		Ok(out)
	}

	fn multiply_plain_inplace(&self, a: &mut Ciphertext, b: &Plaintext) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_MultiplyPlain(self.get_handle(), a.get_handle(), b.get_handle(), a.get_handle(), null_mut())
		})
	}

	fn relinearize(&self, a: &Ciphertext, relin_keys: &RelinearizationKey) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_Relinearize(
				self.get_handle(),
				a.get_handle(),
				relin_keys.get_handle(),
				out.get_handle(),
				null_mut(),
			)
		})?;
		Ok(out)
	}

	fn relinearize_inplace(&self, a: &mut Ciphertext, relin_keys: &RelinearizationKey) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_Relinearize(
				self.get_handle(),
				a.get_handle(),
				relin_keys.get_handle(),
				a.get_handle(),
				null_mut(),
			)
		})
	}

	fn rotate_rows(&self, a: &Ciphertext, steps: i32, galois_keys: &GaloisKey) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_RotateRows(
				self.get_handle(),
				a.get_handle(),
				steps,
				galois_keys.get_handle(),
				out.get_handle(),
				null_mut(),
			)
		})?;
		Ok(out)
	}

	fn rotate_rows_inplace(&self, a: &mut Ciphertext, steps: i32, galois_keys: &GaloisKey) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_RotateRows(
				self.get_handle(),
				a.get_handle(),
				steps,
				galois_keys.get_handle(),
				a.get_handle(),
				null_mut(),
			)
		})
	}

	fn rotate_columns(&self, a: &Ciphertext, galois_keys: &GaloisKey) -> Result<Ciphertext> {
		let out = Ciphertext::new()?;
		convert_seal_error(unsafe {
			bindgen::Evaluator_RotateColumns(
				self.get_handle(),
				a.get_handle(),
				galois_keys.get_handle(),
				out.get_handle(),
				null_mut(),
			)
		})?;
		Ok(out)
	}

	fn rotate_columns_inplace(&self, a: &mut Ciphertext, galois_keys: &GaloisKey) -> Result<()> {
		convert_seal_error(unsafe {
			bindgen::Evaluator_RotateColumns(
				self.get_handle(),
				a.get_handle(),
				galois_keys.get_handle(),
				a.get_handle(),
				null_mut(),
			)
		})
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
	fn add_cipher_cipher_matches_plaintext_sum() {
		let ctx = make_context();
		let keygen = KeyGenerator::new(&ctx).unwrap();
		let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
		let encryptor = Encryptor::with_public_key(&ctx, &keygen.create_public_key()).unwrap();
		let decryptor = Decryptor::new(&ctx, &keygen.secret_key()).unwrap();
		let evaluator = CKKSEvaluator::new(&ctx).unwrap();

		let a: Vec<f64> = (0..encoder.get_slot_count()).map(|i| i as f64).collect();
		let b: Vec<f64> = (0..encoder.get_slot_count()).map(|i| (i as f64) * 2.0).collect();

		let pa = encoder.encode_f64(&a).unwrap();
		let pb = encoder.encode_f64(&b).unwrap();
		let ca = encryptor.encrypt(&pa).unwrap();
		let cb = encryptor.encrypt(&pb).unwrap();

		let sum = evaluator.add(&ca, &cb).unwrap();
		let decoded = encoder.decode_f64(&decryptor.decrypt(&sum).unwrap()).unwrap();

		for (i, d) in decoded.iter().enumerate().take(a.len()) {
			assert!((d - (a[i] + b[i])).abs() < 0.001);
		}
	}
}
