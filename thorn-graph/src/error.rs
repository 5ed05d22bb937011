/// Errors raised while compiling or executing a graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unsupported operator: {0}")]
	UnsupportedOp(String),
	#[error("unsupported element type: {0}")]
	UnsupportedType(String),
	#[error("shape mismatch: {0}")]
	ShapeMismatch(String),
	#[error(transparent)]
	Crypto(#[from] thorn_crypto::Error),
	#[error(transparent)]
	Seal(#[from] thorn_seal::Error),
	#[error(transparent)]
	Protocol(#[from] thorn_core::Error),
	#[error("node `{0}` is not in the slot map")]
	MissingNode(u64),
	#[error("overflow warning: {0}")]
	OverflowWarning(String),
}

pub type Result<T> = std::result::Result<T, Error>;
