//! Wires the backend configuration, CKKS context and client session into a
//! runnable [`backend::Backend`], and exposes the `thornctl` CLI binary.

pub mod backend;
pub mod config;
pub mod error;

pub use backend::Backend;
pub use error::{Error, Result};
