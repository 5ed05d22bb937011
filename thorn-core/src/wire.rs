//! Length-prefixed framing for [`crate::message::Message`]: `u64` big-endian
//! byte length followed by the JSON-encoded payload (spec §4.6).

use std::io::{Read, Write};

use crate::error::Result;
use crate::message::Message;

/// Writes `message` as one frame: an 8-byte big-endian length followed by
/// its JSON encoding.
pub fn write_frame<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
	let body = serde_json::to_vec(message)?;
	writer.write_all(&(body.len() as u64).to_be_bytes())?;
	writer.write_all(&body)?;
	writer.flush()?;
	Ok(())
}

/// Reads one frame and decodes it into a [`Message`]. Returns
/// [`std::io::ErrorKind::UnexpectedEof`] if the stream closes before a full
/// frame arrives.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Message> {
	let mut len_buf = [0u8; 8];
	reader.read_exact(&mut len_buf)?;
	let len = u64::from_be_bytes(len_buf) as usize;

	let mut body = vec![0u8; len];
	reader.read_exact(&mut body)?;

	Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{FunctionMessage, Payload};
	use std::io::Cursor;

	#[test]
	fn round_trips_a_frame() {
		let message = Message::request(Payload::Function(FunctionMessage {
			descriptor: r#"{"function": "Relu"}"#.to_string(),
		}));

		let mut buf = Vec::new();
		write_frame(&mut buf, &message).unwrap();

		let mut cursor = Cursor::new(buf);
		let decoded = read_frame(&mut cursor).unwrap();

		match decoded.payload {
			Payload::Function(f) => assert_eq!(f.function_name().unwrap(), "Relu"),
			_ => panic!("expected Function payload"),
		}
	}

	#[test]
	fn truncated_stream_is_an_io_error() {
		let mut cursor = Cursor::new(vec![0u8; 4]);
		assert!(read_frame(&mut cursor).is_err());
	}
}
