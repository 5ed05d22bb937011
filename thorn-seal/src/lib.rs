#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Safe wrappers over Microsoft SEAL's CKKS scheme.
//!
//! # Notes
//! All types in this crate implement Sync/Send. So long as you never
//! dereference the internal handle on any type after it has been dropped,
//! these traits should safely hold. The internal handles should be of
//! little use to you anyways.
//!
//! This crate intentionally scopes down to CKKS: approximate fixed-point
//! arithmetic over packed real (or complex) vectors, with the modulus
//! switching chain exposed directly so callers can budget multiplicative
//! depth. BFV/BGV integer schemes are out of scope.

#![warn(missing_docs)]

#[cfg(not(target_arch = "wasm32"))]
extern crate link_cplusplus;

#[allow(dead_code)]
#[allow(non_camel_case_types)]
mod bindgen {
	use std::os::raw::c_long;

	include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

	pub const S_OK: c_long = 0x0;
	pub const E_POINTER: c_long = 0x80004003u32 as c_long;
	pub const E_INVALIDARG: c_long = 0x80070057u32 as c_long;
	pub const E_OUTOFMEMORY: c_long = 0x8007000Eu32 as c_long;
	pub const E_UNEXPECTED: c_long = 0x8000FFFFu32 as c_long;
	pub const COR_E_IO: c_long = 0x80131620u32 as c_long;
	pub const COR_E_INVALIDOPERATION: c_long = 0x80131509u32 as c_long;
}

mod ciphertext;
mod context;
mod decryptor;
mod encoder;
mod encryptor;
mod error;
mod evaluator;
mod key_generator;
mod memory;
mod modulus;
mod parameters;
mod plaintext;
mod serialization;

pub use ciphertext::Ciphertext;
pub use context::{Context, ContextData};
pub use decryptor::Decryptor;
pub use encoder::CKKSEncoder;
pub use encryptor::{
	marker as enc_marker, Asym, AsymmetricEncryptor, Encryptor, Sym, SymAsym, SymAsymEncryptor,
	SymmetricEncryptor,
};
pub use error::{Error, Result};
pub use evaluator::{CKKSEvaluator, Evaluator};
pub use key_generator::{GaloisKey, KeyGenerator, PublicKey, RelinearizationKey, SecretKey};
pub use memory::MemoryPool;
pub use modulus::{CoefficientModulus, Modulus, SecurityLevel};
pub use parameters::{CkksEncryptionParametersBuilder, DegreeType, EncryptionParameters, SchemeType};
pub use plaintext::Plaintext;
pub use serialization::{CompressionType, FromBytes, ToBytes};
