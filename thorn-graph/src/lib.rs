//! Compiles a flat operator graph over [`thorn_crypto::HEType`] slots and
//! executes it, dispatching each node to a per-operator kernel and
//! offloading the nonlinear ops CKKS cannot express to a connected client.

pub mod error;
pub mod executor;
pub mod kernel;
pub mod offload;
pub mod op;

pub use error::{Error, Result};
pub use executor::{Executor, ExecutorState, Graph, Node};
pub use op::OpId;
