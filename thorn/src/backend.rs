//! Wires a [`thorn_crypto::BackendConfig`] into a live CKKS context and
//! exposes [`Backend::compile`], which hands back a
//! [`thorn_graph::Executor`] borrowing that context's handles (spec §4.4's
//! executor plus the backend-registration Design Note: "the executor itself
//! holds no globals").

use std::net::SocketAddr;
use std::sync::Arc;

use thorn_core::Session;
use thorn_crypto::{BackendConfig, EnvConfig, HEType};
use thorn_graph::executor::Graph;
use thorn_graph::Executor;
use thorn_seal::{
	CKKSEncoder, CKKSEvaluator, CkksEncryptionParametersBuilder, CoefficientModulus, Context,
	DegreeType, Decryptor, Encryptor, KeyGenerator, RelinearizationKey, SymAsym,
};
use tracing::info;

use crate::error::{Error, Result};

/// A live backend: one CKKS context plus its evaluator, encoder and
/// relinearization keys, and (when `enable_client` is set) the TCP session
/// the executor offloads ReLU/BoundedRelu/MaxPool through.
pub struct Backend {
	context: Context,
	evaluator: CKKSEvaluator,
	encoder: CKKSEncoder,
	encryptor: Encryptor<SymAsym>,
	decryptor: Decryptor,
	relin_keys: RelinearizationKey,
	config: BackendConfig,
	env: EnvConfig,
	session: Option<Arc<Session>>,
}

impl Backend {
	/// Builds the CKKS context from `config.encryption_parameters`, generates
	/// a fresh key pair, and, if `config.enable_client` is set, binds
	/// `listen_addr` and blocks until a client connects (spec §4.6's
	/// handshake happens inside [`Session::accept`]).
	pub fn new(config: BackendConfig, listen_addr: Option<SocketAddr>) -> Result<Self> {
		if config.enable_gc {
			return Err(thorn_core::Error::Unsupported.into());
		}

		let params = &config.encryption_parameters;
		let degree = DegreeType::try_from(params.poly_modulus_degree)
			.map_err(|_| Error::UnsupportedDegree(params.poly_modulus_degree))?;
		let modulus = CoefficientModulus::create(degree, &params.coeff_modulus_bits)?;
		let encryption_parameters = CkksEncryptionParametersBuilder::new()
			.set_poly_modulus_degree(degree)
			.set_coefficient_modulus(modulus)
			.build()?;
		let context = Context::new(&encryption_parameters, true, params.security_level)?;

		let key_gen = KeyGenerator::new(&context)?;
		let public_key = key_gen.create_public_key();
		let secret_key = key_gen.secret_key();
		let relin_keys = key_gen.create_relinearization_keys()?;

		let encoder = CKKSEncoder::new(&context, params.scale)?;
		let evaluator = CKKSEvaluator::new(&context)?;
		let encryptor = Encryptor::with_public_and_secret_key(&context, &public_key, &secret_key)?;
		let decryptor = Decryptor::new(&context, &secret_key)?;

		let session = if config.enable_client {
			let addr = listen_addr.expect("enable_client requires a listen address");
			info!(%addr, "binding client session");
			Some(Session::accept(addr)?)
		} else {
			None
		};

		Ok(Backend {
			context,
			evaluator,
			encoder,
			encryptor,
			decryptor,
			relin_keys,
			config,
			env: EnvConfig::from_env(),
			session,
		})
	}

	/// The parsed backend configuration.
	pub fn config(&self) -> &BackendConfig {
		&self.config
	}

	/// Compiles `graph` against this backend's CKKS handles. The returned
	/// executor borrows from `self`; it may be reused across multiple
	/// `call`s (spec §9 leaves concurrent calls on one executor undefined,
	/// so callers must serialize their own calls).
	pub fn compile(&self, graph: Graph) -> Executor<'_> {
		Executor::new(
			graph,
			&self.context,
			&self.evaluator,
			&self.encoder,
			&self.relin_keys,
			&self.encryptor,
			self.config.tensors.clone(),
			self.session.clone(),
		)
	}

	/// Encrypts a scalar or packed vector of plaintext values.
	pub fn encrypt(&self, values: &[f64]) -> Result<HEType> {
		let plain = self.encoder.encode_f64(values)?;
		Ok(HEType::cipher(self.encryptor.encrypt(&plain)?, self.config.encryption_parameters.complex_packing))
	}

	/// Decrypts a tagged slot, decoding ciphertexts and passing plaintext
	/// slots through unchanged.
	pub fn decrypt(&self, value: &HEType) -> Result<Vec<f64>> {
		match value.as_cipher() {
			Some(cipher) => {
				let plain = self.decryptor.decrypt(cipher)?;
				Ok(self.encoder.decode_f64(&plain)?)
			}
			None => Ok(value.as_plain().map(|p| p.0.clone()).unwrap_or_default()),
		}
	}

	/// The environment-derived verbosity and lazy-mod toggles in effect.
	pub fn env(&self) -> &EnvConfig {
		&self.env
	}
}
