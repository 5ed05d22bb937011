use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;

use serde_json::json;
use thorn_core::message::{HETensorMessage, Message, MessageType, Payload};
use thorn_core::wire::{read_frame, write_frame};
use thorn_core::Session;
use thorn_crypto::{HEType, PlaintextVector};
use thorn_graph::executor::{Graph, Node};
use thorn_graph::{Executor, OpId};
use thorn_seal::{
	CKKSEncoder, CKKSEvaluator, CkksEncryptionParametersBuilder, CoefficientModulus, Context,
	Decryptor, DegreeType, Encryptor, KeyGenerator, SecurityLevel, SymAsym,
};

struct Setup {
	context: Context,
	evaluator: CKKSEvaluator,
	encoder: CKKSEncoder,
	encryptor: Encryptor<SymAsym>,
	decryptor: Decryptor,
}

fn setup() -> (Setup, thorn_seal::RelinearizationKey) {
	let degree = DegreeType::D8192;
	let modulus = CoefficientModulus::create(degree, &[60, 40, 40, 60]).unwrap();
	let params = CkksEncryptionParametersBuilder::new()
		.set_poly_modulus_degree(degree)
		.set_coefficient_modulus(modulus)
		.build()
		.unwrap();
	let context = Context::new(&params, false, SecurityLevel::TC128).unwrap();

	let key_gen = KeyGenerator::new(&context).unwrap();
	let public_key = key_gen.create_public_key();
	let secret_key = key_gen.secret_key();
	let relin_keys = key_gen.create_relinearization_keys().unwrap();

	let encoder = CKKSEncoder::new(&context, 2f64.powi(40)).unwrap();
	let evaluator = CKKSEvaluator::new(&context).unwrap();
	let encryptor = Encryptor::with_public_and_secret_key(&context, &public_key, &secret_key).unwrap();
	let decryptor = Decryptor::new(&context, &secret_key).unwrap();

	(Setup { context, evaluator, encoder, encryptor, decryptor }, relin_keys)
}

fn encrypt(setup: &Setup, v: f64) -> HEType {
	let plain = setup.encoder.encode_f64(&[v]).unwrap();
	HEType::cipher(setup.encryptor.encrypt(&plain).unwrap(), false)
}

fn decrypt(setup: &Setup, a: &HEType) -> f64 {
	match a.as_cipher() {
		Some(c) => {
			let plain = setup.decryptor.decrypt(c).unwrap();
			setup.encoder.decode_f64(&plain).unwrap()[0]
		}
		None => a.as_plain().unwrap().0[0],
	}
}

#[test]
fn add_runs_ciphertext_plus_plaintext_end_to_end() {
	let (setup, relin_keys) = setup();
	let graph = Graph {
		nodes: vec![
			Node { id: 0, op: OpId::Parameter, inputs: vec![], params: json!({"name": "x"}) },
			Node { id: 1, op: OpId::Parameter, inputs: vec![], params: json!({"name": "y"}) },
			Node { id: 2, op: OpId::Add, inputs: vec![0, 1], params: json!(null) },
			Node { id: 3, op: OpId::Result, inputs: vec![2], params: json!({"name": "z"}) },
		],
		output_ids: vec![2],
	};

	let mut executor = Executor::new(graph, &setup.context, &setup.evaluator, &setup.encoder, &relin_keys, &setup.encryptor, HashMap::new(), None);

	let mut inputs = HashMap::new();
	inputs.insert("x".to_string(), vec![encrypt(&setup, 2.0)]);
	inputs.insert("y".to_string(), vec![HEType::plain(PlaintextVector::scalar(3.0), false)]);

	let outputs = executor.call(&inputs).unwrap();
	let z = &outputs["z"][0];
	assert!((decrypt(&setup, z) - 5.0).abs() < 1e-2);
}

#[test]
fn dot_product_of_two_vectors() {
	let (setup, relin_keys) = setup();
	let graph = Graph {
		nodes: vec![
			Node { id: 0, op: OpId::Parameter, inputs: vec![], params: json!({"name": "a"}) },
			Node { id: 1, op: OpId::Parameter, inputs: vec![], params: json!({"name": "b"}) },
			Node { id: 2, op: OpId::Dot, inputs: vec![0, 1], params: json!({"m": 1, "k": 2, "n": 1}) },
			Node { id: 3, op: OpId::Result, inputs: vec![2], params: json!({"name": "out"}) },
		],
		output_ids: vec![2],
	};

	let mut executor = Executor::new(graph, &setup.context, &setup.evaluator, &setup.encoder, &relin_keys, &setup.encryptor, HashMap::new(), None);

	let mut inputs = HashMap::new();
	inputs.insert("a".to_string(), vec![encrypt(&setup, 2.0), encrypt(&setup, 3.0)]);
	inputs.insert(
		"b".to_string(),
		vec![HEType::plain(PlaintextVector::scalar(4.0), false), HEType::plain(PlaintextVector::scalar(5.0), false)],
	);

	let outputs = executor.call(&inputs).unwrap();
	let result = decrypt(&setup, &outputs["out"][0]);
	assert!((result - 23.0).abs() < 1e-1);
}

#[test]
fn batch_norm_inference_applies_precomputed_affine_form() {
	let (setup, relin_keys) = setup();
	let graph = Graph {
		nodes: vec![
			Node { id: 0, op: OpId::Parameter, inputs: vec![], params: json!({"name": "x"}) },
			Node {
				id: 1,
				op: OpId::BatchNormInference,
				inputs: vec![0],
				params: json!({"gamma": [2.0], "beta": [1.0], "mean": [3.0], "variance": [4.0], "epsilon": 0.0}),
			},
			Node { id: 2, op: OpId::Result, inputs: vec![1], params: json!({"name": "out"}) },
		],
		output_ids: vec![1],
	};

	let mut executor = Executor::new(graph, &setup.context, &setup.evaluator, &setup.encoder, &relin_keys, &setup.encryptor, HashMap::new(), None);

	let mut inputs = HashMap::new();
	inputs.insert("x".to_string(), vec![encrypt(&setup, 5.0)]);

	let outputs = executor.call(&inputs).unwrap();
	let result = decrypt(&setup, &outputs["out"][0]);
	let expected_scale = 2.0 / 4.0f64.sqrt();
	let expected = expected_scale * 5.0 + (1.0 - 3.0 * expected_scale);
	assert!((result - expected).abs() < 1e-1);
}

#[test]
fn relu_offload_round_trips_through_a_client_session() {
	let (setup, relin_keys) = setup();
	let addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
	// Session::accept binds its own listener; grab an ephemeral port by
	// binding once up front and reusing its address, matching the
	// SO_REUSEADDR contract the session relies on.
	let probe = std::net::TcpListener::bind(addr).unwrap();
	let bound_addr = probe.local_addr().unwrap();
	drop(probe);

	let server = std::thread::spawn(move || Session::accept(bound_addr).unwrap());
	std::thread::sleep(std::time::Duration::from_millis(50));
	let client_stream = TcpStream::connect(bound_addr).unwrap();
	let session = server.join().unwrap();

	let client = std::thread::spawn(move || {
		let mut reader = BufReader::new(client_stream.try_clone().unwrap());
		let mut writer = BufWriter::new(client_stream);
		loop {
			let message = read_frame(&mut reader).unwrap();
			if let Payload::Function(_) = message.payload {
				continue;
			}
			if let Payload::HETensor(tensor) = message.payload {
				if message.message_type == MessageType::Request {
					let response = HETensorMessage {
						name: "relu".into(),
						shape: tensor.shape.clone(),
						packed: tensor.packed,
						offset: tensor.offset,
						data: tensor.data.clone(),
					};
					write_frame(&mut writer, &Message::response(Payload::HETensor(response))).unwrap();
					return;
				}
			}
		}
	});

	let graph = Graph {
		nodes: vec![
			Node { id: 0, op: OpId::Parameter, inputs: vec![], params: json!({"name": "x"}) },
			Node { id: 1, op: OpId::Relu, inputs: vec![0], params: json!(null) },
			Node { id: 2, op: OpId::Result, inputs: vec![1], params: json!({"name": "out"}) },
		],
		output_ids: vec![1],
	};

	let mut executor =
		Executor::new(graph, &setup.context, &setup.evaluator, &setup.encoder, &relin_keys, &setup.encryptor, HashMap::new(), Some(session));

	let mut inputs = HashMap::new();
	inputs.insert("x".to_string(), vec![encrypt(&setup, 7.0)]);

	let outputs = executor.call(&inputs).unwrap();
	let result = decrypt(&setup, &outputs["out"][0]);
	assert!((result - 7.0).abs() < 1e-1);

	client.join().unwrap();
}
