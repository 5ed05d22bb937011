//! Client-aided offload for the three ops CKKS cannot express at all:
//! `Relu`, `BoundedRelu`, `MaxPool` (spec §4.3, §4.5). An encrypted operand
//! is serialized into an [`HETensorMessage`], sent to the client over the
//! [`Session`]'s rendezvous, and the client's plaintext-computed (then
//! re-encrypted) answer is read back and deserialized.

use thorn_core::message::HETensorMessage;
use thorn_core::Session;
use thorn_crypto::{modulus_chain, HEType};
use thorn_seal::{Context, FromBytes, ToBytes};

use crate::error::Result;
use crate::kernel::context::KernelContext;

fn from_message(context: &Context, message: &HETensorMessage) -> Result<thorn_seal::Ciphertext> {
	let bytes = message.data.first().ok_or_else(|| {
		crate::error::Error::UnsupportedOp(format!("offload response `{}` carried no ciphertext bytes", message.name))
	})?;
	Ok(thorn_seal::Ciphertext::from_bytes(context, bytes)?)
}

/// Offloads every cipher slot of one `Relu` or `BoundedRelu` call in a
/// single round trip: `ciphers` is leveled to a common chain index (spec
/// §4.5 step 1), packed into one [`HETensorMessage`] whose `data` carries
/// one entry per slot, and shipped as one request. `function` is the
/// client-side descriptor name (`"relu"` or `"bounded_relu"`); `bound` is
/// ignored by `relu`.
pub fn relu_or_bounded_relu(
	kctx: &KernelContext,
	session: &Session,
	function: &str,
	ciphers: &[thorn_seal::Ciphertext],
	complex_packing: bool,
) -> Result<Vec<thorn_seal::Ciphertext>> {
	let mut slots: Vec<HEType> = ciphers.iter().cloned().map(|c| HEType::cipher(c, complex_packing)).collect();
	modulus_chain::match_to_smallest_chain_index(kctx.context, kctx.evaluator, &mut slots)?;

	let data: Result<Vec<Vec<u8>>> = slots
		.iter()
		.map(|s| Ok(s.as_cipher().expect("relu batch holds only cipher slots").as_bytes()?))
		.collect();

	let request = HETensorMessage {
		name: function.to_string(),
		shape: vec![slots.len() as u64],
		packed: complex_packing,
		offset: 0,
		data: data?,
	};

	let responses = session.offload_relu(function, request)?;
	let response = responses.first().ok_or_else(|| {
		crate::error::Error::UnsupportedOp(format!("{function} offload returned no response"))
	})?;

	response.data.iter().map(|bytes| Ok(thorn_seal::Ciphertext::from_bytes(kctx.context, bytes)?)).collect()
}

/// Offloads a `MaxPool` window's worth of ciphertext cells to the client,
/// returning one re-encrypted maximum per window in request order.
pub fn max_pool(kctx: &KernelContext, session: &Session, windows: &[Vec<thorn_seal::Ciphertext>]) -> Result<Vec<thorn_seal::Ciphertext>> {
	let cells: Result<Vec<HETensorMessage>> = windows
		.iter()
		.enumerate()
		.map(|(i, window)| {
			// A window's cells are concatenated into one message's `data`
			// list; the client returns one ciphertext per window.
			let data: Result<Vec<Vec<u8>>> = window.iter().map(|c| Ok(c.as_bytes()?)).collect();
			Ok(HETensorMessage {
				name: "max_pool_window".to_string(),
				shape: vec![window.len() as u64],
				packed: false,
				offset: i as u64,
				data: data?,
			})
		})
		.collect();

	let responses = session.offload_max_pool(cells?)?;
	responses.iter().map(|r| from_message(kctx.context, r)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn relu_batch_message_carries_one_entry_per_slot() {
		// Constructing real Ciphertexts needs a live SEAL context; this test
		// only checks the struct-shaping logic the batched relu request
		// builds, via the shape/data fields.
		let message = HETensorMessage { name: "relu".into(), shape: vec![3], packed: false, offset: 0, data: vec![vec![1], vec![2], vec![3]] };
		assert_eq!(message.shape, vec![3]);
		assert_eq!(message.data.len(), 3);
	}
}
