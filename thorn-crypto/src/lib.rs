//! Tracks the CKKS-level invariants the graph executor depends on: the
//! tagged plaintext/ciphertext data model, modulus-chain bookkeeping, and
//! annotation propagation over a computation graph's parameters.

pub mod annotation;
pub mod config;
pub mod error;
pub mod he_type;
pub mod modulus_chain;
pub mod tensor;

pub use annotation::{Annotation, NodeId, PackingBehavior};
pub use config::{BackendConfig, EncryptionParametersConfig, EnvConfig, SchemeName, TensorAttributes};
pub use error::{Error, Result};
pub use he_type::{HESlot, HEType, PlaintextVector};
pub use modulus_chain::LazyAccumulator;
pub use tensor::{ElementType, Tensor};
