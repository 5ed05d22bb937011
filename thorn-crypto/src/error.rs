/// Errors raised while tracking modulus-chain position, scale, and shape
/// invariants over [`crate::tensor::Tensor`]s of [`crate::he_type::HEType`]
/// slots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Encryption-parameters config failed validation before context
	/// creation.
	#[error("invalid encryption parameters: {0}")]
	InvalidParameters(String),

	/// A call into the underlying CKKS adapter failed.
	#[error(transparent)]
	Seal(#[from] thorn_seal::Error),

	/// The modulus-chain manager could not reconcile two operands' scales.
	#[error("ciphertext scales are incompatible: {0}")]
	ScaleMismatch(String),

	/// A mod-switch or rescale was requested below the bottom of the chain.
	#[error("cannot mod-switch below the last entry in the modulus chain")]
	ChainExhausted,

	/// `complex_packing` disagreed between two operands of a binary op.
	#[error("operands disagree on complex packing")]
	TypeTagMismatch,

	/// A [`crate::tensor::Tensor`] invariant was violated.
	#[error("tensor shape mismatch: {0}")]
	ShapeMismatch(String),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
