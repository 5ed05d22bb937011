//! Resolves the backend's `<key, value>` configuration map (spec §6) into
//! [`thorn_crypto::BackendConfig`], accepting `encryption_parameters` as
//! either an inline JSON blob or a path to one, and reads the three
//! recognized environment variables via [`thorn_crypto::EnvConfig`].

use std::collections::HashMap;
use std::fs;

use thorn_crypto::{BackendConfig, EnvConfig};

use crate::error::{Error, Result};

/// Parses the raw configuration map, resolving `encryption_parameters` from
/// disk first if its value is not itself a JSON object.
pub fn load(raw: &HashMap<String, String>) -> Result<BackendConfig> {
	let mut resolved = raw.clone();

	if let Some(value) = resolved.get("encryption_parameters") {
		if !value.trim_start().starts_with('{') {
			let path = value.clone();
			let contents = fs::read_to_string(&path)
				.map_err(|source| Error::ConfigFile { path, source })?;
			resolved.insert("encryption_parameters".to_string(), contents);
		}
	}

	Ok(BackendConfig::parse(&resolved)?)
}

/// Reads `NGRAPH_HE_VERBOSE_OPS`, `NGRAPH_HE_LOG_LEVEL` and `LAZY_MOD` from
/// the process environment.
pub fn env() -> EnvConfig {
	EnvConfig::from_env()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_inline_encryption_parameters_without_touching_disk() {
		let mut raw = HashMap::new();
		raw.insert(
			"encryption_parameters".to_string(),
			r#"{"scheme_name": "HE_SEAL", "poly_modulus_degree": 8192, "security_level": 128, "coeff_modulus": [60, 40, 40, 60]}"#.to_string(),
		);

		let config = load(&raw).unwrap();
		assert_eq!(config.encryption_parameters.poly_modulus_degree, 8192);
	}

	#[test]
	fn resolves_encryption_parameters_from_a_file_path() {
		let dir = std::env::temp_dir();
		let path = dir.join("thorn_test_encryption_parameters.json");
		std::fs::write(
			&path,
			r#"{"scheme_name": "HE_SEAL", "poly_modulus_degree": 4096, "security_level": 0, "coeff_modulus": [30, 30, 30]}"#,
		)
		.unwrap();

		let mut raw = HashMap::new();
		raw.insert("encryption_parameters".to_string(), path.to_string_lossy().to_string());

		let config = load(&raw).unwrap();
		assert_eq!(config.encryption_parameters.poly_modulus_degree, 4096);

		std::fs::remove_file(&path).ok();
	}
}
