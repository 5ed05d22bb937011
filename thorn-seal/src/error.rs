use std::os::raw::c_long;

use static_assertions::const_assert;

use crate::bindgen::{
	COR_E_INVALIDOPERATION, COR_E_IO, E_INVALIDARG, E_OUTOFMEMORY, E_POINTER, E_UNEXPECTED,
};

/// A type representing all errors that can occur when calling into the
/// underlying SEAL library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// An argument is invalid.
	#[error("The argument is not valid")]
	InvalidArgument,

	/// A pointer is invalid. Encountering this from the Rust bindings is a bug.
	#[error("Invalid pointer")]
	InvalidPointer,

	/// The machine ran out of memory.
	#[error("Out of memory")]
	OutOfMemory,

	/// An unknown error occurred in SEAL.
	#[error("Unexpected")]
	Unexpected,

	/// An internal invariant was violated.
	#[error("Internal error {0}")]
	InternalError(c_long),

	/// An unrecognized SEAL error code.
	#[error("Unknown {0}")]
	Unknown(c_long),

	/// The caller failed to set a polynomial modulus degree.
	#[error("Polynomial modulus degree not set")]
	DegreeNotSet,

	/// The caller failed to set a coefficient modulus.
	#[error("Coefficient modulus not set")]
	CoefficientModulusNotSet,

	/// Mod-switching below the bottom of the chain.
	#[error("Cannot mod-switch below the last entry in the modulus chain")]
	ChainExhausted,

	/// Two operands could not be reconciled to a common scale.
	#[error("Ciphertext scales are incompatible: {0}")]
	ScaleMismatch(String),

	/// `complex_packing` disagreed between two operands of a binary op.
	#[error("Operands disagree on complex packing")]
	TypeTagMismatch,

	/// Serialization failed.
	#[error("Serialization failed: {0}")]
	SerializationError(Box<String>),
}

const_assert!(std::mem::size_of::<Error>() <= 24);

impl From<c_long> for Error {
	fn from(err: c_long) -> Self {
		match err {
			E_POINTER => Error::InvalidPointer,
			E_INVALIDARG => Error::InvalidArgument,
			E_OUTOFMEMORY => Error::OutOfMemory,
			E_UNEXPECTED => Error::Unexpected,
			COR_E_IO => Error::InternalError(err),
			COR_E_INVALIDOPERATION => Error::InternalError(err),
			_ => Error::Unknown(err),
		}
	}
}

/// The result type for calls into SEAL.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts a SEAL `c_long` status code into a `()`-valued [`Result`].
/// Equal to `bindgen::S_OK` maps to `Ok(())`, anything else to `Err`.
#[macro_export]
macro_rules! try_seal {
	($err:expr) => {
		if $err == $crate::bindgen::S_OK {
			Ok(())
		} else {
			Err($crate::Error::from($err))
		}
	};
}

/// Converts a SEAL error code into a Rust [`Result`] error.
pub fn convert_seal_error(err: c_long) -> Result<()> {
	try_seal!(err)
}
