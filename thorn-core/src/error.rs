/// Errors raised by the client protocol and its transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("malformed message: {0}")]
	ClientProtocol(String),
	#[error("unknown function descriptor: {0}")]
	UnknownFunction(String),
	#[error("wrong tensor name: expected `{expected}`, got `{actual}`")]
	WrongTensorName { expected: String, actual: String },
	#[error("garbled-circuit offload is not implemented")]
	Unsupported,
	#[error("session closed while a call was pending")]
	ClientAborted,
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("malformed function descriptor: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
