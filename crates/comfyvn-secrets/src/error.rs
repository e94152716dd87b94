// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the secret store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for secret store operations.
pub type SecretsResult<T> = Result<T, SecretStoreError>;

/// Errors that can occur during secret store operations.
///
/// Callers branch on the variant, not on message text: `DecryptFailed`
/// means the envelope exists but the active key cannot open it (wrong or
/// rotated key), while `Malformed` means the file itself is damaged.
#[derive(Debug, Error)]
pub enum SecretStoreError {
	// =========================================================================
	// Configuration Errors
	// =========================================================================
	#[error("encryption key not configured: set {env_var} or create {}", path.display())]
	NotConfigured { env_var: String, path: PathBuf },

	#[error("configuration error: {0}")]
	Configuration(String),

	// =========================================================================
	// Integrity Errors
	// =========================================================================
	#[error("malformed secrets envelope: {0}")]
	Malformed(String),

	#[error("failed to decrypt secrets envelope under key {fingerprint}")]
	DecryptFailed { fingerprint: String },

	#[error("invalid secrets payload: {0}")]
	InvalidPayload(String),

	// =========================================================================
	// Encryption Errors
	// =========================================================================
	#[error("encryption failed: {0}")]
	Encryption(String),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("secrets I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl SecretStoreError {
	/// True for errors that indicate on-disk or key damage rather than
	/// caller mistakes. These are audited before propagation.
	pub fn is_integrity(&self) -> bool {
		matches!(
			self,
			SecretStoreError::Malformed(_)
				| SecretStoreError::DecryptFailed { .. }
				| SecretStoreError::InvalidPayload(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn integrity_errors_are_flagged() {
		assert!(SecretStoreError::Malformed("bad json".into()).is_integrity());
		assert!(SecretStoreError::DecryptFailed {
			fingerprint: "abc".into()
		}
		.is_integrity());
		assert!(!SecretStoreError::Configuration("oops".into()).is_integrity());
	}

	#[test]
	fn not_configured_names_the_env_var_and_path() {
		let err = SecretStoreError::NotConfigured {
			env_var: "COMFYVN_SECRETS_KEY".into(),
			path: PathBuf::from("/data/secrets.key"),
		};
		let msg = err.to_string();
		assert!(msg.contains("COMFYVN_SECRETS_KEY"));
		assert!(msg.contains("secrets.key"));
	}
}
