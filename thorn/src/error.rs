//! Errors raised while wiring a [`crate::backend::Backend`] from raw
//! configuration into a ready-to-run CKKS context and executor.

/// Errors raised at backend setup, before any graph has been compiled.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Crypto(#[from] thorn_crypto::Error),
	#[error(transparent)]
	Seal(#[from] thorn_seal::Error),
	#[error(transparent)]
	Graph(#[from] thorn_graph::Error),
	#[error(transparent)]
	Protocol(#[from] thorn_core::Error),
	#[error("unsupported polynomial modulus degree: {0}")]
	UnsupportedDegree(u64),
	#[error("failed to read encryption_parameters file `{path}`: {source}")]
	ConfigFile { path: String, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
