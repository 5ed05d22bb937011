//! CLI entry point: loads a backend configuration, a flattened operator
//! graph, and a named-tensor input file, runs one `Executor::call`, and
//! prints the decrypted outputs as JSON.
//!
//! `enable_performance_collection` is accepted as a flag here but, per spec
//! §9's open question, only toggles a log line rather than gating anything.

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use thorn_crypto::{HEType, PlaintextVector};
use thorn_graph::executor::Graph;
use tracing::info;

#[derive(Parser)]
#[command(name = "thornctl", about = "Runs one encrypted-inference graph call")]
struct Cli {
	/// Path to the flattened operator graph, as JSON (spec §4.2).
	#[arg(long)]
	graph: PathBuf,

	/// Path to the `<key, value>` backend configuration map, as a flat JSON
	/// object of strings (spec §6).
	#[arg(long)]
	config: PathBuf,

	/// Path to a JSON object mapping tensor name to its input values.
	#[arg(long)]
	inputs: PathBuf,

	/// Address to bind the client session on, required when the
	/// configuration sets `enable_client`.
	#[arg(long)]
	listen: Option<SocketAddr>,

	/// Logs a summary table at call completion.
	#[arg(long)]
	enable_performance_collection: bool,
}

fn init_tracing(env: &thorn_crypto::EnvConfig) {
	let level = match env.log_level {
		Some(l) if l >= 3 => "trace",
		Some(2) => "debug",
		Some(1) => "info",
		Some(0) => "warn",
		_ => "info",
	};
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let env = thorn::config::env();
	init_tracing(&env);

	let raw_config: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(&cli.config)?)?;
	let backend_config = thorn::config::load(&raw_config)?;
	let backend = thorn::Backend::new(backend_config, cli.listen)?;

	let graph: Graph = serde_json::from_str(&fs::read_to_string(&cli.graph)?)?;
	let raw_inputs: HashMap<String, Vec<f64>> = serde_json::from_str(&fs::read_to_string(&cli.inputs)?)?;

	let mut inputs = HashMap::new();
	for (name, values) in raw_inputs {
		let attrs = backend.config().tensors.get(&name).copied().unwrap_or_default();
		let slots: Vec<HEType> = values
			.into_iter()
			.map(|v| {
				if attrs.encrypt || attrs.client_input {
					backend.encrypt(&[v])
				} else {
					Ok(HEType::plain(PlaintextVector::scalar(v), false))
				}
			})
			.collect::<thorn::Result<_>>()?;
		inputs.insert(name, slots);
	}

	let mut executor = backend.compile(graph);
	let outputs = executor.call(&inputs)?;

	if cli.enable_performance_collection {
		info!(output_count = outputs.len(), "call finished");
	}

	let mut decoded = HashMap::new();
	for (name, slots) in outputs {
		let mut values = Vec::with_capacity(slots.len());
		for slot in &slots {
			values.extend(backend.decrypt(slot)?);
		}
		decoded.insert(name, values);
	}

	println!("{}", serde_json::to_string_pretty(&decoded)?);
	Ok(())
}
