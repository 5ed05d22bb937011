use criterion::{black_box, criterion_group, criterion_main, Criterion};
use thorn_crypto::modulus_chain::{match_modulus_and_scale_inplace, rescale};
use thorn_seal::{
	CKKSEncoder, CKKSEvaluator, CkksEncryptionParametersBuilder, CoefficientModulus, Context,
	DegreeType, Encryptor, Evaluator, KeyGenerator, SecurityLevel,
};

fn build_context() -> Context {
	let degree = DegreeType::D8192;
	let modulus = CoefficientModulus::create(degree, &[60, 40, 40, 60]).unwrap();
	let params = CkksEncryptionParametersBuilder::new()
		.set_poly_modulus_degree(degree)
		.set_coefficient_modulus(modulus)
		.build()
		.unwrap();

	Context::new(&params, false, SecurityLevel::TC128).unwrap()
}

fn match_modulus_benchmark(c: &mut Criterion) {
	let ctx = build_context();
	let key_gen = KeyGenerator::new(&ctx).unwrap();
	let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
	let evaluator = CKKSEvaluator::new(&ctx).unwrap();
	let encryptor = Encryptor::with_public_and_secret_key(
		&ctx,
		&key_gen.create_public_key(),
		&key_gen.secret_key(),
	)
	.unwrap();

	c.bench_function("match_modulus_and_scale level gap", |b| {
		b.iter_batched(
			|| {
				let mut x = encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap();
				let y = encryptor.encrypt(&encoder.encode_f64(&[2.0]).unwrap()).unwrap();
				evaluator.mod_switch_to_next_inplace(&mut x).unwrap();
				(x, y)
			},
			|(mut x, mut y)| {
				match_modulus_and_scale_inplace(&ctx, &evaluator, &mut x, &mut y).unwrap();
				black_box((x, y))
			},
			criterion::BatchSize::SmallInput,
		)
	});

	c.bench_function("rescale after multiply", |b| {
		b.iter_batched(
			|| {
				let a = encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap();
				let raw = encoder.encode_f64(&[2.0]).unwrap();
				evaluator.multiply_plain(&a, &raw).unwrap()
			},
			|mut product| {
				rescale(&evaluator, &mut product).unwrap();
				black_box(product)
			},
			criterion::BatchSize::SmallInput,
		)
	});
}

criterion_group!(benches, match_modulus_benchmark);
criterion_main!(benches);
