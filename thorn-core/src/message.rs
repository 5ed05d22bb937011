//! The structured payload carried by every framed message (spec §4.6). The
//! generated-protobuf re-export style the teacher used for its federated
//! protocol (`thorn-core/src/protocol/*.rs`) has no generator to re-export
//! here, since this protocol is hand-framed rather than gRPC; these types
//! play the same role the teacher's `Parameters`/`TaskIns`/`Node` re-exports
//! did, just hand-written.

use serde::{Deserialize, Serialize};

/// Whether a message initiates an exchange or answers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
	/// Initiates an exchange; the peer is expected to answer with `Response`.
	Request,
	/// Answers a prior `Request`.
	Response,
	/// A malformed or unrecognized type tag was read off the wire.
	Unknown,
}

/// The server's CKKS encryption parameters, sent to the client immediately
/// after accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionParametersMessage {
	pub scale: f64,
	pub complex_packing: bool,
	pub security_level: u64,
	/// The `thorn_seal`-serialized native parameter blob.
	pub native_blob: Vec<u8>,
}

/// The client's public key, sent once after receiving encryption parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyMessage {
	pub key_bytes: Vec<u8>,
}

/// The client's relinearization key, sent alongside the public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelinearizationKeyMessage {
	pub key_bytes: Vec<u8>,
}

/// A JSON function descriptor naming the requested operation and its
/// parameters, e.g. `{"function": "Relu"}` or
/// `{"function": "MaxPool", "cell": 3}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMessage {
	pub descriptor: String,
}

impl FunctionMessage {
	/// Parses the embedded JSON and returns the `"function"` field.
	pub fn function_name(&self) -> crate::error::Result<String> {
		let value: serde_json::Value = serde_json::from_str(&self.descriptor)?;
		value
			.get("function")
			.and_then(|v| v.as_str())
			.map(str::to_owned)
			.ok_or_else(|| {
				crate::error::Error::ClientProtocol(format!(
					"function descriptor missing \"function\": {}",
					self.descriptor
				))
			})
	}
}

/// A wire-serialized tensor: one `data` entry per slot, each holding either
/// a serialized ciphertext or an encoded plaintext, positionally aligned
/// with the request this tensor answers or accompanies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HETensorMessage {
	pub name: String,
	pub shape: Vec<u64>,
	pub packed: bool,
	pub offset: u64,
	pub data: Vec<Vec<u8>>,
}

/// The set of sub-messages a framed [`Message`] may carry, mirroring the
/// `EncryptionParameters`/`PublicKey`/`RelinearizationKey`/`Function`/
/// `HETensor` union from spec §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
	EncryptionParameters(EncryptionParametersMessage),
	PublicKey(PublicKeyMessage),
	RelinearizationKey(RelinearizationKeyMessage),
	Function(FunctionMessage),
	HETensor(HETensorMessage),
}

/// One message exchanged over a session: a type tag plus its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
	pub message_type: MessageType,
	pub payload: Payload,
}

impl Message {
	pub fn request(payload: Payload) -> Self {
		Message { message_type: MessageType::Request, payload }
	}

	pub fn response(payload: Payload) -> Self {
		Message { message_type: MessageType::Response, payload }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn function_name_extracts_field() {
		let f = FunctionMessage { descriptor: r#"{"function": "Relu"}"#.to_string() };
		assert_eq!(f.function_name().unwrap(), "Relu");
	}

	#[test]
	fn function_name_rejects_missing_field() {
		let f = FunctionMessage { descriptor: r#"{"op": "Relu"}"#.to_string() };
		assert!(f.function_name().is_err());
	}
}
