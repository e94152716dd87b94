// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope key resolution.
//!
//! Resolution order, used whenever the store needs to encrypt or decrypt:
//!
//! 1. `COMFYVN_SECRETS_KEY` environment variable (base64)
//! 2. the first existing key file among the configured candidates
//! 3. with `ensure`, a freshly generated key, persisted to the primary
//!    key path (an env-supplied key is never written back to disk)
//!
//! Without `ensure`, absence of any key is a configuration error telling
//! the operator which env var or file to provide.

use std::fs;
use std::path::Path;

use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use comfyvn_common_secret::SecretString;

use crate::cipher::KEY_SIZE;
use crate::config::{SecretsConfig, KEY_ENV_VAR};
use crate::error::{SecretStoreError, SecretsResult};

/// Number of hex characters in a key fingerprint.
const FINGERPRINT_LEN: usize = 16;

/// Where a resolved key came from.
///
/// `rotate_key` uses this to decide whether persisting the replacement key
/// is the store's job (file/generated) or the operator's (env).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
	/// Supplied via `COMFYVN_SECRETS_KEY`.
	Env,
	/// Read from a key file.
	File(std::path::PathBuf),
	/// Generated by this process.
	Generated,
}

/// A 32-byte envelope key plus its provenance.
pub struct EncryptionKey {
	bytes: Zeroizing<[u8; KEY_SIZE]>,
	source: KeySource,
}

impl EncryptionKey {
	/// Generate a fresh random key.
	pub fn generate() -> Self {
		let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
		OsRng.fill_bytes(bytes.as_mut());
		Self {
			bytes,
			source: KeySource::Generated,
		}
	}

	/// Decode a base64-encoded key.
	pub fn from_base64(encoded: &str, source: KeySource) -> SecretsResult<Self> {
		let decoded: Zeroizing<Vec<u8>> = Zeroizing::new(
			BASE64
				.decode(encoded.trim().as_bytes())
				.map_err(|e| SecretStoreError::Configuration(format!("invalid key base64: {e}")))?,
		);

		if decoded.len() != KEY_SIZE {
			return Err(SecretStoreError::Configuration(format!(
				"envelope key must be {} bytes, got {}",
				KEY_SIZE,
				decoded.len()
			)));
		}

		let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
		bytes.copy_from_slice(&decoded);
		Ok(Self { bytes, source })
	}

	/// Raw key bytes for the cipher.
	pub fn bytes(&self) -> &[u8; KEY_SIZE] {
		&self.bytes
	}

	/// Base64 encoding of the key, wrapped so it cannot be logged.
	pub fn to_base64(&self) -> SecretString {
		SecretString::new(BASE64.encode(self.bytes.as_ref()))
	}

	/// Short non-reversible digest used to correlate audit events with a
	/// key generation. Never the key itself.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.bytes.as_ref());
		hex::encode(digest)[..FINGERPRINT_LEN].to_string()
	}

	/// Where this key came from.
	pub fn source(&self) -> &KeySource {
		&self.source
	}

	/// True when the key was supplied via the environment.
	pub fn is_env_supplied(&self) -> bool {
		self.source == KeySource::Env
	}
}

impl Clone for EncryptionKey {
	fn clone(&self) -> Self {
		let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
		bytes.copy_from_slice(self.bytes.as_ref());
		Self {
			bytes,
			source: self.source.clone(),
		}
	}
}

impl std::fmt::Debug for EncryptionKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EncryptionKey")
			.field("fingerprint", &self.fingerprint())
			.field("source", &self.source)
			.finish()
	}
}

/// Resolve the active envelope key.
///
/// With `ensure` set, a missing key is generated and persisted to the
/// primary key path. Without it, absence is a `NotConfigured` error.
pub fn resolve_key(config: &SecretsConfig, ensure: bool) -> SecretsResult<EncryptionKey> {
	if let Ok(value) = std::env::var(KEY_ENV_VAR) {
		if !value.trim().is_empty() {
			debug!("envelope key resolved from environment");
			return EncryptionKey::from_base64(&value, KeySource::Env);
		}
	}

	for path in config.key_paths() {
		if path.exists() {
			let contents = fs::read_to_string(path)?;
			let key =
				EncryptionKey::from_base64(contents.trim(), KeySource::File(path.clone()))?;
			debug!(path = %path.display(), fingerprint = %key.fingerprint(), "envelope key resolved from file");
			return Ok(key);
		}
	}

	if !ensure {
		return Err(SecretStoreError::NotConfigured {
			env_var: KEY_ENV_VAR.to_string(),
			path: config.primary_key_path().to_path_buf(),
		});
	}

	let key = EncryptionKey::generate();
	persist_key(&key, config.primary_key_path())?;
	debug!(fingerprint = %key.fingerprint(), "generated new envelope key");
	Ok(key)
}

/// Write the key file: one base64 line, 0600 on Unix, staged through a
/// temp file in the same directory.
pub fn persist_key(key: &EncryptionKey, path: &Path) -> SecretsResult<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}

	let temp_path = path.with_extension("key.tmp");
	fs::write(&temp_path, format!("{}\n", key.to_base64().expose()))?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let perms = fs::Permissions::from_mode(0o600);
		if let Err(e) = fs::set_permissions(&temp_path, perms) {
			warn!(path = %temp_path.display(), error = %e, "failed to set key file permissions to 0600");
		}
	}

	fs::rename(&temp_path, path)?;
	Ok(())
}
