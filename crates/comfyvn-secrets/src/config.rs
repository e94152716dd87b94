// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the secret store.
//!
//! The config carries paths, not key material: where the envelope file
//! lives and which key file candidates to probe, in order.

use std::path::{Path, PathBuf};

/// Environment variable holding the envelope key (base64, overrides files).
pub const KEY_ENV_VAR: &str = "COMFYVN_SECRETS_KEY";

/// Environment variable overriding the envelope file path.
pub const DATA_PATH_ENV_VAR: &str = "COMFYVN_SECRETS_PATH";

/// Environment variable prepending a key file candidate.
pub const KEY_FILE_ENV_VAR: &str = "COMFYVN_SECRETS_KEY_FILE";

/// Prefix for per-field read-time overrides
/// (`COMFYVN_SECRET_<PROVIDER>_<FIELD>`).
pub const OVERRIDE_PREFIX: &str = "COMFYVN_SECRET_";

/// Default envelope file name.
const DATA_FILE_NAME: &str = "secrets.json";

/// Default key file name, kept beside the envelope.
const KEY_FILE_NAME: &str = "secrets.key";

/// Paths and env names used by the secret store.
#[derive(Debug, Clone)]
pub struct SecretsConfig {
	/// Location of the encrypted envelope file.
	data_path: PathBuf,
	/// Candidate key files, probed in order. The first entry is where a
	/// generated key is persisted.
	key_paths: Vec<PathBuf>,
}

impl SecretsConfig {
	/// Create a config with explicit paths.
	pub fn new(data_path: impl Into<PathBuf>, key_paths: Vec<PathBuf>) -> Self {
		Self {
			data_path: data_path.into(),
			key_paths,
		}
	}

	/// Config rooted in a single directory: `secrets.json` + `secrets.key`.
	pub fn for_dir(dir: &Path) -> Self {
		Self {
			data_path: dir.join(DATA_FILE_NAME),
			key_paths: vec![dir.join(KEY_FILE_NAME)],
		}
	}

	/// Config from the environment.
	///
	/// - `COMFYVN_SECRETS_PATH` overrides the envelope location
	/// - `COMFYVN_SECRETS_KEY_FILE` is probed before the default key path
	/// - otherwise everything lives under the platform data directory
	pub fn from_env() -> Self {
		let data_path = std::env::var_os(DATA_PATH_ENV_VAR)
			.map(PathBuf::from)
			.unwrap_or_else(|| default_data_dir().join(DATA_FILE_NAME));

		let default_key_path = data_path
			.parent()
			.map(|p| p.join(KEY_FILE_NAME))
			.unwrap_or_else(|| PathBuf::from(KEY_FILE_NAME));

		let mut key_paths = Vec::new();
		if let Some(explicit) = std::env::var_os(KEY_FILE_ENV_VAR) {
			key_paths.push(PathBuf::from(explicit));
		}
		key_paths.push(default_key_path);

		Self {
			data_path,
			key_paths,
		}
	}

	/// Location of the encrypted envelope file.
	pub fn data_path(&self) -> &Path {
		&self.data_path
	}

	/// Candidate key files, in probe order.
	pub fn key_paths(&self) -> &[PathBuf] {
		&self.key_paths
	}

	/// Where a generated or rotated key is persisted.
	pub fn primary_key_path(&self) -> &Path {
		self
			.key_paths
			.first()
			.map(PathBuf::as_path)
			.unwrap_or_else(|| Path::new(KEY_FILE_NAME))
	}
}

fn default_data_dir() -> PathBuf {
	dirs::data_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("comfyvn")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn for_dir_places_both_files_in_the_directory() {
		let config = SecretsConfig::for_dir(Path::new("/data/comfyvn"));

		assert_eq!(
			config.data_path(),
			Path::new("/data/comfyvn/secrets.json")
		);
		assert_eq!(
			config.primary_key_path(),
			Path::new("/data/comfyvn/secrets.key")
		);
	}

	#[test]
	fn explicit_key_paths_are_probed_in_order() {
		let config = SecretsConfig::new(
			"/data/secrets.json",
			vec![
				PathBuf::from("/etc/comfyvn/secrets.key"),
				PathBuf::from("/data/secrets.key"),
			],
		);

		assert_eq!(config.key_paths().len(), 2);
		assert_eq!(
			config.primary_key_path(),
			Path::new("/etc/comfyvn/secrets.key")
		);
	}
}
