//! The session actor: binds the TCP acceptor, runs the per-connection read
//! loop on its own thread, and exposes the mutex/condvar rendezvous points
//! the executor blocks on (spec §4.6, §5).

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::message::{
	EncryptionParametersMessage, FunctionMessage, HETensorMessage, Message, MessageType, Payload,
	PublicKeyMessage, RelinearizationKeyMessage,
};
use crate::wire::{read_frame, write_frame};

/// Binds a listener with `SO_REUSEADDR` set, matching the acceptor
/// requirement in spec §4.6.
fn bind_reuseaddr(addr: SocketAddr) -> std::io::Result<TcpListener> {
	let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
	socket.set_reuse_address(true)?;
	socket.bind(&addr.into())?;
	socket.listen(128)?;
	Ok(socket.into())
}

/// One offload class's pending-batch rendezvous: the executor blocks on
/// `condvar` until `done_count == expected`, and the session thread writes
/// `responses[i]` then increments `done_count` before notifying. ReLU and
/// BoundedRelu share one instance; MaxPool uses a separate one, per the
/// Design Note ("one condvar per logical offload op class").
#[derive(Default)]
struct OffloadBatch {
	state: Mutex<OffloadState>,
	condvar: Condvar,
}

#[derive(Default)]
struct OffloadState {
	responses: Vec<Option<HETensorMessage>>,
	done_count: usize,
	expected: usize,
	aborted: bool,
}

impl OffloadBatch {
	/// Resets the batch for `expected` responses and returns a guard the
	/// caller blocks on via [`Self::wait`].
	fn start(&self, expected: usize) {
		let mut state = self.state.lock().unwrap();
		*state = OffloadState { responses: vec![None; expected], done_count: 0, expected, aborted: false };
	}

	/// Records one response at its positional index and wakes a waiter if
	/// the batch just completed.
	fn record(&self, index: usize, tensor: HETensorMessage) {
		let mut state = self.state.lock().unwrap();
		if index < state.responses.len() {
			state.responses[index] = Some(tensor);
			state.done_count += 1;
		}
		if state.done_count >= state.expected {
			self.condvar.notify_all();
		}
	}

	/// Blocks until every expected response has been recorded, then returns
	/// them positionally. Returns [`Error::ClientAborted`] if the session
	/// was closed while this was pending.
	fn wait(&self) -> Result<Vec<HETensorMessage>> {
		let mut state = self.state.lock().unwrap();
		while state.done_count < state.expected && !state.aborted {
			state = self.condvar.wait(state).unwrap();
		}

		if state.aborted {
			return Err(Error::ClientAborted);
		}

		Ok(state.responses.iter().cloned().map(Option::unwrap).collect())
	}

	fn abort(&self) {
		let mut state = self.state.lock().unwrap();
		state.aborted = true;
		self.condvar.notify_all();
	}
}

/// Blocks a predicate-based rendezvous (`session_started`,
/// `client_inputs_received`) behind a mutex/condvar pair.
#[derive(Default)]
struct Gate {
	ready: Mutex<bool>,
	condvar: Condvar,
}

impl Gate {
	fn open(&self) {
		*self.ready.lock().unwrap() = true;
		self.condvar.notify_all();
	}

	fn wait(&self) {
		let mut ready = self.ready.lock().unwrap();
		while !*ready {
			ready = self.condvar.wait(ready).unwrap();
		}
	}
}

/// One long-lived client session (spec §4.6): owns the accepted stream's
/// write half, the client's keys once received, the inbound parameter
/// tensors, and the two offload rendezvous points.
pub struct Session {
	writer: Mutex<BufWriter<TcpStream>>,
	public_key: Mutex<Option<PublicKeyMessage>>,
	relin_key: Mutex<Option<RelinearizationKeyMessage>>,
	client_inputs: Mutex<HashMap<String, HETensorMessage>>,
	session_started: Gate,
	client_inputs_received: Gate,
	relu_batch: OffloadBatch,
	max_pool_batch: OffloadBatch,
	reader_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
	/// Binds `addr` with `SO_REUSEADDR`, accepts one connection, and spawns
	/// the session's read-loop thread.
	pub fn accept(addr: SocketAddr) -> Result<Arc<Session>> {
		let listener = bind_reuseaddr(addr)?;
		info!(%addr, "listening for client connection");

		let (stream, peer) = listener.accept()?;
		info!(%peer, "accepted client connection");

		let reader = stream.try_clone()?;
		let session = Arc::new(Session {
			writer: Mutex::new(BufWriter::new(stream)),
			public_key: Mutex::new(None),
			relin_key: Mutex::new(None),
			client_inputs: Mutex::new(HashMap::new()),
			session_started: Gate::default(),
			client_inputs_received: Gate::default(),
			relu_batch: OffloadBatch::default(),
			max_pool_batch: OffloadBatch::default(),
			reader_thread: Mutex::new(None),
		});

		session.session_started.open();

		let worker = Arc::clone(&session);
		let handle = std::thread::spawn(move || worker.read_loop(reader));
		*session.reader_thread.lock().unwrap() = Some(handle);

		Ok(session)
	}

	/// Sends the server's encryption parameters as the first message of the
	/// handshake.
	pub fn send_encryption_parameters(&self, params: EncryptionParametersMessage) -> Result<()> {
		self.send(Message::response(Payload::EncryptionParameters(params)))
	}

	/// Sends a parameter-shape request to the client and waits until all
	/// `from_client` inputs named in `expected_names` have arrived.
	pub fn request_client_inputs(&self, expected_names: &[String]) -> Result<HashMap<String, HETensorMessage>> {
		self.client_inputs_received.wait();
		let inputs = self.client_inputs.lock().unwrap();
		for name in expected_names {
			if !inputs.contains_key(name) {
				return Err(Error::ClientProtocol(format!("missing client input `{name}`")));
			}
		}
		Ok(inputs.clone())
	}

	/// Sends a ReLU/BoundedRelu offload batch request and blocks until the
	/// client answers every slot.
	pub fn offload_relu(&self, function: &str, tensor: HETensorMessage) -> Result<Vec<HETensorMessage>> {
		self.offload(&self.relu_batch, function, tensor)
	}

	/// Sends one MaxPool offload request per output cell and blocks until
	/// every cell's response has arrived.
	pub fn offload_max_pool(&self, cells: Vec<HETensorMessage>) -> Result<Vec<HETensorMessage>> {
		self.max_pool_batch.start(cells.len());
		for cell in cells {
			self.send(Message::request(Payload::HETensor(cell)))?;
		}
		self.max_pool_batch.wait()
	}

	fn offload(&self, batch: &OffloadBatch, function: &str, tensor: HETensorMessage) -> Result<Vec<HETensorMessage>> {
		batch.start(1);
		self.send(Message::request(Payload::Function(FunctionMessage {
			descriptor: format!(r#"{{"function": "{function}"}}"#),
		})))?;
		self.send(Message::request(Payload::HETensor(tensor)))?;
		batch.wait()
	}

	/// Sends result tensors back to the client to close out a call.
	pub fn send_results(&self, tensors: Vec<HETensorMessage>) -> Result<()> {
		for tensor in tensors {
			self.send(Message::response(Payload::HETensor(tensor)))?;
		}
		Ok(())
	}

	fn send(&self, message: Message) -> Result<()> {
		let mut writer = self.writer.lock().unwrap();
		write_frame(&mut *writer, &message)
	}

	/// Aborts any offload batch currently pending, e.g. on session close.
	pub fn abort_pending(&self) {
		self.relu_batch.abort();
		self.max_pool_batch.abort();
	}

	fn read_loop(&self, stream: TcpStream) {
		let mut reader = BufReader::new(stream);
		loop {
			let message = match read_frame(&mut reader) {
				Ok(m) => m,
				Err(err) => {
					warn!(%err, "session read loop terminating");
					self.abort_pending();
					return;
				}
			};

			if let Err(err) = self.dispatch(message) {
				error!(%err, "failed to handle inbound message");
			}
		}
	}

	fn dispatch(&self, message: Message) -> Result<()> {
		match message.payload {
			Payload::PublicKey(key) => {
				debug!("received client public key");
				*self.public_key.lock().unwrap() = Some(key);
				Ok(())
			}
			Payload::RelinearizationKey(key) => {
				debug!("received client relinearization key");
				*self.relin_key.lock().unwrap() = Some(key);
				Ok(())
			}
			Payload::HETensor(tensor) if message.message_type == MessageType::Request => {
				debug!(name = %tensor.name, "received client input tensor");
				self.client_inputs.lock().unwrap().insert(tensor.name.clone(), tensor);
				self.client_inputs_received.open();
				Ok(())
			}
			Payload::HETensor(tensor) => {
				debug!(offset = tensor.offset, "received offload response");
				self.relu_batch.record(tensor.offset as usize, tensor.clone());
				self.max_pool_batch.record(tensor.offset as usize, tensor);
				Ok(())
			}
			Payload::Function(f) => Err(Error::UnknownFunction(f.function_name()?)),
			Payload::EncryptionParameters(_) => {
				Err(Error::ClientProtocol("server does not expect EncryptionParameters from client".into()))
			}
		}
	}

	/// Returns the client's public key, once received.
	pub fn public_key(&self) -> Option<PublicKeyMessage> {
		self.public_key.lock().unwrap().clone()
	}

	/// Returns the client's relinearization key, once received.
	pub fn relinearization_key(&self) -> Option<RelinearizationKeyMessage> {
		self.relin_key.lock().unwrap().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpStream as StdStream;

	#[test]
	fn relu_batch_records_single_response() {
		let batch = OffloadBatch::default();
		batch.start(1);
		batch.record(
			0,
			HETensorMessage { name: "relu_out".into(), shape: vec![1], packed: false, offset: 0, data: vec![vec![1]] },
		);

		let result = batch.wait().unwrap();
		assert_eq!(result.len(), 1);
		assert_eq!(result[0].name, "relu_out");
	}

	#[test]
	fn abort_wakes_a_waiter_with_client_aborted() {
		let batch = Arc::new(OffloadBatch::default());
		batch.start(1);

		let waiter = Arc::clone(&batch);
		let handle = std::thread::spawn(move || waiter.wait());

		std::thread::sleep(std::time::Duration::from_millis(20));
		batch.abort();

		assert!(matches!(handle.join().unwrap(), Err(Error::ClientAborted)));
	}

	#[test]
	fn bind_reuseaddr_allows_immediate_rebind() {
		let listener = bind_reuseaddr("127.0.0.1:0".parse().unwrap()).unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let rebound = bind_reuseaddr(addr);
		assert!(rebound.is_ok());
		let _: Option<StdStream> = None;
	}
}
