use std::net::TcpStream;
use std::time::Duration;

use thorn_core::message::{HETensorMessage, Message, Payload, PublicKeyMessage};
use thorn_core::session::Session;
use thorn_core::wire::write_frame;

#[test]
fn session_captures_handshake_and_client_input() {
	let addr = "127.0.0.1:0".parse().unwrap();
	let listener = std::net::TcpListener::bind(addr).unwrap();
	let bound = listener.local_addr().unwrap();
	drop(listener);

	let accepting = std::thread::spawn(move || Session::accept(bound).unwrap());

	// Give the acceptor a moment to start listening before the client connects.
	std::thread::sleep(Duration::from_millis(50));

	let mut client = TcpStream::connect(bound).unwrap();
	write_frame(
		&mut client,
		&Message::response(Payload::PublicKey(PublicKeyMessage { key_bytes: vec![1, 2, 3] })),
	)
	.unwrap();
	write_frame(
		&mut client,
		&Message::request(Payload::HETensor(HETensorMessage {
			name: "x".to_string(),
			shape: vec![1],
			packed: false,
			offset: 0,
			data: vec![vec![9]],
		})),
	)
	.unwrap();

	let session = accepting.join().unwrap();

	// Poll briefly for the read loop to process both frames.
	for _ in 0..50 {
		if session.public_key().is_some() {
			break;
		}
		std::thread::sleep(Duration::from_millis(10));
	}

	assert_eq!(session.public_key().unwrap().key_bytes, vec![1, 2, 3]);

	let inputs = session.request_client_inputs(&["x".to_string()]).unwrap();
	assert_eq!(inputs.get("x").unwrap().data, vec![vec![9]]);
}
