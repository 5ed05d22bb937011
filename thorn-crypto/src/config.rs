//! Parses the backend's key-value configuration map and the
//! encryption-parameters JSON blob, and reads the three recognized
//! environment variables.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};
use thorn_seal::SecurityLevel;
use tracing::debug;

use crate::error::{Error, Result};

/// Per-tensor attributes parsed out of a comma-separated config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorAttributes {
	/// The named tensor is bound from the client at call time.
	pub client_input: bool,
	/// Encrypt this tensor if it is not already encrypted.
	pub encrypt: bool,
	/// Use plaintext packing along axis 0 for this tensor.
	pub packed: bool,
}

/// The backend's parsed configuration: per-tensor attributes plus the
/// client/garbled-circuit toggles and encryption parameters.
#[derive(Debug, Clone)]
pub struct BackendConfig {
	/// Attributes keyed by tensor name.
	pub tensors: HashMap<String, TensorAttributes>,
	/// Run the client-aided protocol.
	pub enable_client: bool,
	/// Use garbled circuits for nonlinear ops instead of client offload.
	/// The garbled-circuit path itself is an external collaborator with no
	/// implementation in this crate; this flag is only recorded here.
	pub enable_gc: bool,
	/// Accepted but, per the open question this leaves unresolved, only
	/// used to toggle a log summary at `call` completion rather than
	/// gating any behavior.
	pub enable_performance_collection: bool,
	/// The resolved encryption parameters.
	pub encryption_parameters: EncryptionParametersConfig,
}

/// The known top-level configuration keys. Anything else is rejected so the
/// permitted option set stays an enumerated mapping rather than an
/// open-ended string map.
const RESERVED_KEYS: &[&str] = &[
	"enable_client",
	"enable_gc",
	"enable_performance_collection",
	"encryption_parameters",
];

impl BackendConfig {
	/// Parses the raw `<key, value>` map accepted at backend setup.
	/// Tensor-attribute entries are any key not in [`RESERVED_KEYS`]; their
	/// value is a comma-separated list of `client_input`/`encrypt`/`packed`.
	pub fn parse(raw: &HashMap<String, String>) -> Result<Self> {
		let mut tensors = HashMap::new();
		let mut enable_client = false;
		let mut enable_gc = false;
		let mut enable_performance_collection = false;
		let mut encryption_parameters = None;

		for (key, value) in raw {
			match key.as_str() {
				"enable_client" => enable_client = parse_bool(key, value)?,
				"enable_gc" => enable_gc = parse_bool(key, value)?,
				"enable_performance_collection" => {
					enable_performance_collection = parse_bool(key, value)?
				}
				"encryption_parameters" => {
					encryption_parameters = Some(EncryptionParametersConfig::parse_json(value)?);
				}
				_ => {
					let mut attrs = TensorAttributes::default();
					for attr in value.split(',').map(str::trim) {
						match attr {
							"client_input" => attrs.client_input = true,
							"encrypt" => attrs.encrypt = true,
							"packed" => attrs.packed = true,
							"" => {}
							other => {
								return Err(Error::InvalidParameters(format!(
									"unknown tensor attribute `{other}` for `{key}`"
								)))
							}
						}
					}
					tensors.insert(key.clone(), attrs);
				}
			}
		}

		debug!(tensor_count = tensors.len(), enable_client, enable_gc, "parsed backend config");

		Ok(BackendConfig {
			tensors,
			enable_client,
			enable_gc,
			enable_performance_collection,
			encryption_parameters: encryption_parameters.unwrap_or_default(),
		})
	}
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
	match value {
		"True" | "true" => Ok(true),
		"False" | "false" => Ok(false),
		other => Err(Error::InvalidParameters(format!(
			"`{key}` must be \"True\" or \"False\", got `{other}`"
		))),
	}
}

/// The `encryption_parameters` JSON blob's scheme tag. Only `HE_SEAL` (CKKS)
/// is accepted; any other value fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeName {
	/// Microsoft SEAL's CKKS scheme.
	#[serde(rename = "HE_SEAL")]
	HeSeal,
}

/// The JSON-deserializable shape of `encryption_parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEncryptionParameters {
	scheme_name: SchemeName,
	poly_modulus_degree: u64,
	security_level: u32,
	coeff_modulus: Vec<i32>,
	scale: Option<f64>,
	complex_packing: Option<bool>,
}

/// Resolved encryption parameters ready to hand to
/// [`thorn_seal::CkksEncryptionParametersBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionParametersConfig {
	/// Ring degree, one of 1024/2048/4096/8192/16384/32768.
	pub poly_modulus_degree: u64,
	/// HomomorphicEncryption.org security level.
	pub security_level: SecurityLevel,
	/// Ordered coefficient-modulus prime bit sizes.
	pub coeff_modulus_bits: Vec<i32>,
	/// Default encoding scale.
	pub scale: f64,
	/// Whether the imaginary CKKS lane is used as an independent batch
	/// element.
	pub complex_packing: bool,
}

impl Default for EncryptionParametersConfig {
	/// The defaults spec'd for the backend: a 1024-degree ring, five
	/// 30-bit moduli, no enforced security level, scale `2^30`, and no
	/// complex packing.
	fn default() -> Self {
		EncryptionParametersConfig {
			poly_modulus_degree: 1024,
			security_level: SecurityLevel::None,
			coeff_modulus_bits: vec![30, 30, 30, 30, 30],
			scale: 2f64.powi(30),
			complex_packing: false,
		}
	}
}

impl EncryptionParametersConfig {
	fn parse_json(raw: &str) -> Result<Self> {
		let parsed: RawEncryptionParameters = serde_json::from_str(raw)
			.map_err(|e| Error::InvalidParameters(format!("encryption_parameters: {e}")))?;

		let security_level = match parsed.security_level {
			0 => SecurityLevel::None,
			128 => SecurityLevel::TC128,
			192 => SecurityLevel::TC192,
			256 => SecurityLevel::TC256,
			other => {
				return Err(Error::InvalidParameters(format!(
					"security_level must be one of 0, 128, 192, 256, got {other}"
				)))
			}
		};

		if parsed.coeff_modulus.is_empty() {
			return Err(Error::InvalidParameters(
				"coeff_modulus must not be empty".into(),
			));
		}

		let scale = parsed.scale.unwrap_or_else(|| derive_default_scale(&parsed.coeff_modulus));

		Ok(EncryptionParametersConfig {
			poly_modulus_degree: parsed.poly_modulus_degree,
			security_level,
			coeff_modulus_bits: parsed.coeff_modulus,
			scale,
			complex_packing: parsed.complex_packing.unwrap_or(false),
		})
	}
}

/// Derives a default scale from the coefficient-modulus bit sizes when the
/// JSON blob omits one: with >=3 moduli, the second-to-last modulus's
/// value; with exactly 2, the last modulus's value divided by 4096;
/// otherwise `sqrt(coeff_modulus[0] / 256)`. The moduli here are given as
/// bit sizes, not concrete prime values, so this approximates each modulus
/// as `2^bits`.
fn derive_default_scale(coeff_modulus_bits: &[i32]) -> f64 {
	let value_at = |bits: i32| 2f64.powi(bits);

	match coeff_modulus_bits.len() {
		n if n >= 3 => value_at(coeff_modulus_bits[n - 2]),
		2 => value_at(coeff_modulus_bits[1]) / 4096.0,
		_ => (value_at(coeff_modulus_bits[0]) / 256.0).sqrt(),
	}
}

/// The recognized environment variables (spec §6).
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
	/// Comma-separated operator ids to log verbosely, or `"all"`.
	pub verbose_ops: Option<String>,
	/// `tracing` log level, as an integer per the source convention.
	pub log_level: Option<i32>,
	/// Whether lazy modular reduction is enabled for additions.
	pub lazy_mod: bool,
}

impl EnvConfig {
	/// Reads `NGRAPH_HE_VERBOSE_OPS`, `NGRAPH_HE_LOG_LEVEL`, and `LAZY_MOD`
	/// from the process environment.
	pub fn from_env() -> Self {
		EnvConfig {
			verbose_ops: env::var("NGRAPH_HE_VERBOSE_OPS").ok(),
			log_level: env::var("NGRAPH_HE_LOG_LEVEL").ok().and_then(|v| v.parse().ok()),
			lazy_mod: env::var("LAZY_MOD")
				.map(|v| v.eq_ignore_ascii_case("true"))
				.unwrap_or(false),
		}
	}

	/// Whether operator `id` should log verbosely, per `NGRAPH_HE_VERBOSE_OPS`.
	pub fn is_verbose(&self, id: &str) -> bool {
		match &self.verbose_ops {
			Some(v) if v == "all" => true,
			Some(v) => v.split(',').any(|op| op.trim() == id),
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_unknown_tensor_attribute() {
		let mut raw = HashMap::new();
		raw.insert("x".to_string(), "client_input,bogus".to_string());

		assert!(matches!(BackendConfig::parse(&raw), Err(Error::InvalidParameters(_))));
	}

	#[test]
	fn parses_comma_separated_tensor_attributes() {
		let mut raw = HashMap::new();
		raw.insert("x".to_string(), "client_input,encrypt".to_string());
		raw.insert("enable_client".to_string(), "True".to_string());

		let config = BackendConfig::parse(&raw).unwrap();
		let attrs = config.tensors.get("x").unwrap();
		assert!(attrs.client_input);
		assert!(attrs.encrypt);
		assert!(!attrs.packed);
		assert!(config.enable_client);
	}

	#[test]
	fn default_scale_derivation_three_or_more_moduli() {
		assert_eq!(derive_default_scale(&[60, 40, 40, 60]), 2f64.powi(40));
	}

	#[test]
	fn default_scale_derivation_two_moduli() {
		assert_eq!(derive_default_scale(&[40, 40]), 2f64.powi(40) / 4096.0);
	}

	#[test]
	fn default_scale_derivation_one_modulus() {
		assert_eq!(derive_default_scale(&[30]), (2f64.powi(30) / 256.0).sqrt());
	}

	#[test]
	fn encryption_parameters_round_trip_json() {
		let json = r#"{
			"scheme_name": "HE_SEAL",
			"poly_modulus_degree": 8192,
			"security_level": 128,
			"coeff_modulus": [60, 40, 40, 60]
		}"#;

		let parsed = EncryptionParametersConfig::parse_json(json).unwrap();
		assert_eq!(parsed.poly_modulus_degree, 8192);
		assert_eq!(parsed.security_level, SecurityLevel::TC128);
		assert_eq!(parsed.scale, 2f64.powi(40));
		assert!(!parsed.complex_packing);
	}

	#[test]
	fn defaults_match_spec() {
		let defaults = EncryptionParametersConfig::default();
		assert_eq!(defaults.poly_modulus_degree, 1024);
		assert_eq!(defaults.coeff_modulus_bits, vec![30, 30, 30, 30, 30]);
		assert_eq!(defaults.scale, 2f64.powi(30));
	}
}
