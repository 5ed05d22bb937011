//! Averages the gradients of three simulated federated learning clients
//! under CKKS, never decrypting an individual client's contribution.
use rand::Rng;
use thorn_seal::{
	CKKSEncoder, CKKSEvaluator, Ciphertext, CkksEncryptionParametersBuilder, CoefficientModulus,
	Context, Decryptor, DegreeType, Encryptor, Error, Evaluator, KeyGenerator, SecurityLevel,
};

fn generate_random_tensor(size: usize) -> Vec<f64> {
	let mut rng = rand::thread_rng();
	(0..size).map(|_| rng.gen_range(0.0..1.0)).collect()
}

fn create_ckks_context(degree: DegreeType, bit_sizes: &[i32]) -> Result<Context, Error> {
	let modulus_chain = CoefficientModulus::create(degree, bit_sizes)?;
	let params = CkksEncryptionParametersBuilder::new()
		.set_poly_modulus_degree(degree)
		.set_coefficient_modulus(modulus_chain)
		.build()?;

	Context::new(&params, false, SecurityLevel::TC128)
}

fn average_ciphertexts(
	encoder: &CKKSEncoder,
	evaluator: &CKKSEvaluator,
	ciphertexts: &[Ciphertext],
	size: usize,
) -> Result<Ciphertext, Error> {
	let sum = evaluator.add_many(ciphertexts)?;

	let fraction = vec![1.0 / ciphertexts.len() as f64; size];
	let fraction = encoder.encode_f64(&fraction)?;

	evaluator.multiply_plain(&sum, &fraction)
}

fn average_plaintexts(tensors: &[Vec<f64>]) -> Vec<f64> {
	let mut avg = vec![0.0; tensors[0].len()];
	for tensor in tensors {
		for (i, &val) in tensor.iter().enumerate() {
			avg[i] += val;
		}
	}
	avg.iter_mut().for_each(|val| *val /= tensors.len() as f64);
	avg
}

fn main() -> Result<(), Error> {
	let ctx = create_ckks_context(DegreeType::D8192, &[60, 40, 40, 60])?;

	let key_gen = KeyGenerator::new(&ctx)?;
	let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40))?;
	let evaluator = CKKSEvaluator::new(&ctx)?;

	let public_key = key_gen.create_public_key();
	let secret_key = key_gen.secret_key();

	let client_gradients = [
		generate_random_tensor(10),
		generate_random_tensor(10),
		generate_random_tensor(10),
	];

	let encryptor = Encryptor::with_public_and_secret_key(&ctx, &public_key, &secret_key)?;
	let decryptor = Decryptor::new(&ctx, &secret_key)?;

	let encrypted: Vec<Ciphertext> = client_gradients
		.iter()
		.map(|g| encryptor.encrypt(&encoder.encode_f64(g)?))
		.collect::<Result<_, Error>>()?;

	println!("plaintext average: {:?}", average_plaintexts(&client_gradients));

	let avg = average_ciphertexts(&encoder, &evaluator, &encrypted, 10)?;
	let decoded = encoder.decode_f64(&decryptor.decrypt(&avg)?)?;

	println!("decrypted average: {:?}", &decoded[..10]);

	Ok(())
}
