use crate::Result;

/// The compression applied when serializing a SEAL object to bytes.
#[allow(unused)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
	None = 0,
	ZLib = 1,
	ZStd = 2,
}

/// Converts a SEAL object into its serialized byte representation.
pub trait ToBytes {
	/// Returns the object as a byte array.
	fn as_bytes(&self) -> Result<Vec<u8>>;
}

/// Reconstructs a SEAL object from bytes under some caller-supplied state
/// (usually the [`crate::Context`] the bytes were serialized under).
pub trait FromBytes {
	/// The state needed to deserialize, e.g. a [`crate::Context`].
	type State;

	/// Deserializes an object from `bytes` given `state`.
	fn from_bytes(state: &Self::State, bytes: &[u8]) -> Result<Self>
	where
		Self: Sized;
}
