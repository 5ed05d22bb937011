//! The client protocol and session transport: length-prefixed TCP framing,
//! the handshake/offload message set, and the session actor the executor
//! blocks on (spec §4.6, §5).

pub mod error;
pub mod message;
pub mod session;
pub mod wire;

pub use error::{Error, Result};
pub use message::{Message, MessageType, Payload};
pub use session::Session;
