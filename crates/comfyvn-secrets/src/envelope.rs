// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk envelope codec.
//!
//! The envelope is the only persistent representation of the provider
//! secret map. This module serializes/deserializes the envelope JSON,
//! classifies unknown files (envelope vs. legacy plaintext), and moves the
//! map through the [`EnvelopeCipher`] seam.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::EnvelopeCipher;
use crate::error::{SecretStoreError, SecretsResult};
use crate::keys::EncryptionKey;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Provider name → field name → field value.
pub type ProviderSecretMap = BTreeMap<String, BTreeMap<String, String>>;

/// The encrypted on-disk container for all provider secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsEnvelope {
	pub version: u32,
	/// Algorithm tag of the cipher that sealed `ciphertext`.
	pub algorithm: String,
	/// Base64 of the sealed provider map.
	pub ciphertext: String,
	/// When the envelope was last written.
	pub updated_at: DateTime<Utc>,
	/// Fingerprint of the key that sealed this envelope.
	pub fingerprint: String,
}

/// What an existing secrets file turned out to contain.
#[derive(Debug)]
pub enum DiskContents {
	/// A current encrypted envelope.
	Envelope(SecretsEnvelope),
	/// A legacy unencrypted provider map, upgraded on first load.
	Legacy(ProviderSecretMap),
}

/// Classify the raw contents of the secrets file.
///
/// A JSON object carrying `algorithm` and `ciphertext` is an envelope;
/// any other JSON object is treated as a legacy plaintext provider map.
/// Everything else is malformed.
pub fn classify(raw: &str) -> SecretsResult<DiskContents> {
	let value: serde_json::Value = serde_json::from_str(raw)
		.map_err(|e| SecretStoreError::Malformed(format!("invalid JSON: {e}")))?;

	let obj = match value {
		serde_json::Value::Object(obj) => obj,
		other => {
			return Err(SecretStoreError::Malformed(format!(
				"expected a JSON object, got {}",
				json_type_name(&other)
			)));
		}
	};

	if obj.contains_key("algorithm") && obj.contains_key("ciphertext") {
		let envelope: SecretsEnvelope = serde_json::from_value(serde_json::Value::Object(obj))
			.map_err(|e| SecretStoreError::Malformed(format!("invalid envelope: {e}")))?;
		return Ok(DiskContents::Envelope(envelope));
	}

	Ok(DiskContents::Legacy(legacy_map_from_object(obj)?))
}

/// Seal a provider map into a fresh envelope.
pub fn seal_map(
	cipher: &dyn EnvelopeCipher,
	key: &EncryptionKey,
	map: &ProviderSecretMap,
) -> SecretsResult<SecretsEnvelope> {
	let plaintext = serde_json::to_vec(map)
		.map_err(|e| SecretStoreError::Encryption(format!("payload serialization failed: {e}")))?;

	let sealed = cipher.seal(key.bytes(), &plaintext)?;

	Ok(SecretsEnvelope {
		version: ENVELOPE_VERSION,
		algorithm: cipher.algorithm().to_string(),
		ciphertext: BASE64.encode(sealed),
		updated_at: Utc::now(),
		fingerprint: key.fingerprint(),
	})
}

/// Open an envelope back into the provider map.
///
/// The algorithm tag must match the active cipher; a mismatch is a
/// `Malformed` error so operators can tell it apart from a wrong key.
pub fn open_map(
	cipher: &dyn EnvelopeCipher,
	key: &EncryptionKey,
	envelope: &SecretsEnvelope,
) -> SecretsResult<ProviderSecretMap> {
	if envelope.algorithm != cipher.algorithm() {
		return Err(SecretStoreError::Malformed(format!(
			"unsupported envelope algorithm {:?}, expected {:?}",
			envelope.algorithm,
			cipher.algorithm()
		)));
	}

	let sealed = BASE64
		.decode(envelope.ciphertext.as_bytes())
		.map_err(|e| SecretStoreError::Malformed(format!("ciphertext is not base64: {e}")))?;

	let plaintext = cipher.open(key.bytes(), &sealed).map_err(|e| match e {
		SecretStoreError::DecryptFailed { .. } => SecretStoreError::DecryptFailed {
			fingerprint: key.fingerprint(),
		},
		other => other,
	})?;

	let map: serde_json::Value = serde_json::from_slice(&plaintext)
		.map_err(|e| SecretStoreError::InvalidPayload(format!("decrypted payload: {e}")))?;

	match map {
		serde_json::Value::Object(obj) => legacy_map_from_object(obj).map_err(|_| {
			SecretStoreError::InvalidPayload(
				"decrypted payload must map providers to field objects".to_string(),
			)
		}),
		other => Err(SecretStoreError::InvalidPayload(format!(
			"decrypted payload must be a JSON object, got {}",
			json_type_name(&other)
		))),
	}
}

/// Convert a JSON object into a provider map.
///
/// Field values must be scalars; null and empty values are dropped per the
/// provider-map invariant. Used for both legacy files and decrypted
/// payloads, so hand-edited legacy values like numeric ports survive as
/// their string form.
fn legacy_map_from_object(
	obj: serde_json::Map<String, serde_json::Value>,
) -> SecretsResult<ProviderSecretMap> {
	let mut map = ProviderSecretMap::new();

	for (provider, fields) in obj {
		let fields_obj = match fields {
			serde_json::Value::Object(fields_obj) => fields_obj,
			other => {
				return Err(SecretStoreError::InvalidPayload(format!(
					"provider {provider:?} must map to a field object, got {}",
					json_type_name(&other)
				)));
			}
		};

		let mut entry = BTreeMap::new();
		for (field, value) in fields_obj {
			let value = match value {
				serde_json::Value::Null => continue,
				serde_json::Value::String(s) => s,
				serde_json::Value::Number(n) => n.to_string(),
				serde_json::Value::Bool(b) => b.to_string(),
				other => {
					return Err(SecretStoreError::InvalidPayload(format!(
						"field {provider}.{field} must be a scalar, got {}",
						json_type_name(&other)
					)));
				}
			};

			if value.trim().is_empty() {
				continue;
			}
			entry.insert(field, value);
		}

		map.insert(provider, entry);
	}

	Ok(map)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "a boolean",
		serde_json::Value::Number(_) => "a number",
		serde_json::Value::String(_) => "a string",
		serde_json::Value::Array(_) => "an array",
		serde_json::Value::Object(_) => "an object",
	}
}
