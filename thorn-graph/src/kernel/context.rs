//! The handles every kernel needs: the CKKS context/evaluator/encoder plus
//! the keys required for relinearization and exponentiation, and the
//! `lazy_mod` toggle read from [`thorn_crypto::config::EnvConfig`].

use thorn_seal::{CKKSEncoder, CKKSEvaluator, Context, Encryptor, RelinearizationKey, SymAsym};

/// Shared, read-only state passed to every kernel invocation (spec §4.3:
/// `K(args, out, op_params, type, batch_size, context)`'s `context`
/// parameter).
pub struct KernelContext<'a> {
	pub context: &'a Context,
	pub evaluator: &'a CKKSEvaluator,
	pub encoder: &'a CKKSEncoder,
	pub relin_keys: &'a RelinearizationKey,
	/// Used to encrypt a parameter bound to a plaintext tensor whose
	/// annotation declares `encrypted` (spec §4.4 step 3).
	pub encryptor: &'a Encryptor<SymAsym>,
	/// Whether additions defer modular reduction via
	/// [`thorn_crypto::modulus_chain::LazyAccumulator`] (spec §4.2).
	pub lazy_mod: bool,
}
