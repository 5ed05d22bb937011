use criterion::{black_box, criterion_group, criterion_main, Criterion};
use thorn_crypto::HEType;
use thorn_graph::kernel::{elementwise, KernelContext};
use thorn_graph::op::OpId;
use thorn_seal::{
	CKKSEncoder, CKKSEvaluator, CkksEncryptionParametersBuilder, CoefficientModulus, Context,
	DegreeType, Encryptor, KeyGenerator, SecurityLevel,
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

fn dispatch_benchmark(c: &mut Criterion) {
	let ctx = build_context();
	let key_gen = KeyGenerator::new(&ctx).unwrap();
	let encoder = CKKSEncoder::new(&ctx, 2.0f64.powi(40)).unwrap();
	let evaluator = CKKSEvaluator::new(&ctx).unwrap();
	let relin_keys = key_gen.create_relinearization_keys().unwrap();
	let encryptor = Encryptor::with_public_and_secret_key(
		&ctx,
		&key_gen.create_public_key(),
		&key_gen.secret_key(),
	)
	.unwrap();

	let kctx = KernelContext {
		context: &ctx,
		evaluator: &evaluator,
		encoder: &encoder,
		relin_keys: &relin_keys,
		encryptor: &encryptor,
		lazy_mod: false,
	};

	let a = HEType::cipher(encryptor.encrypt(&encoder.encode_f64(&[1.0]).unwrap()).unwrap(), false);
	let b = HEType::cipher(encryptor.encrypt(&encoder.encode_f64(&[2.0]).unwrap()).unwrap(), false);

	c.bench_function("cipher+cipher add dispatch", |bch| {
		bch.iter(|| black_box(elementwise::binary(OpId::Add, &kctx, &a, &b).unwrap()))
	});

	c.bench_function("cipher*cipher multiply dispatch", |bch| {
		bch.iter(|| black_box(elementwise::binary(OpId::Multiply, &kctx, &a, &b).unwrap()))
	});
}

criterion_group!(benches, dispatch_benchmark);
criterion_main!(benches);
