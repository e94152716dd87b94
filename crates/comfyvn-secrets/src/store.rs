// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provider-keyed secret store.
//!
//! One store instance owns the envelope file, the key resolution state and
//! the decrypted in-memory cache. Every read-modify-write sequence runs
//! under the store lock; persistence is atomic-by-rename so no reader ever
//! observes a half-written envelope.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use comfyvn_audit::{AuditEvent, AuditEventKind, AuditLog};

use crate::cipher::{Aes256GcmCipher, EnvelopeCipher};
use crate::config::{SecretsConfig, OVERRIDE_PREFIX};
use crate::envelope::{self, DiskContents, ProviderSecretMap, SecretsEnvelope};
use crate::error::{SecretStoreError, SecretsResult};
use crate::keys::{self, EncryptionKey};

/// Field names tried by [`SecretStore::resolve`] when the caller does not
/// pin the lookup to specific stored fields. Caller-supplied names are
/// consulted first; this list is always appended, never skipped.
pub const DEFAULT_RESOLVE_KEYS: &[&str] = &["api_key", "token", "key", "secret"];

/// Non-secret introspection of one provider entry.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescription {
	pub provider: String,
	/// Names of fields persisted in the envelope.
	pub stored_keys: Vec<String>,
	/// Names of fields currently supplied via environment override.
	pub override_keys: Vec<String>,
	/// Whether the provider exists in the stored map.
	pub present: bool,
}

#[derive(Default)]
struct StoreState {
	cache: Option<ProviderSecretMap>,
	key: Option<EncryptionKey>,
}

/// Encrypted provider credential store.
pub struct SecretStore {
	config: SecretsConfig,
	cipher: Arc<dyn EnvelopeCipher>,
	audit: AuditLog,
	state: Mutex<StoreState>,
}

impl SecretStore {
	/// Create a store with the default AES-256-GCM envelope cipher.
	pub fn new(config: SecretsConfig, audit: AuditLog) -> Self {
		Self::with_cipher(config, audit, Arc::new(Aes256GcmCipher::new()))
	}

	/// Create a store with an explicit cipher implementation.
	pub fn with_cipher(
		config: SecretsConfig,
		audit: AuditLog,
		cipher: Arc<dyn EnvelopeCipher>,
	) -> Self {
		Self {
			config,
			cipher,
			audit,
			state: Mutex::new(StoreState::default()),
		}
	}

	/// The configuration this store was built with.
	pub fn config(&self) -> &SecretsConfig {
		&self.config
	}

	/// Return the decrypted provider map.
	///
	/// Serves from the cache unless `refresh` is set or no cache exists.
	/// An absent envelope file is an empty map, not an error. A legacy
	/// plaintext file is transparently re-encrypted in place and its
	/// values returned.
	#[instrument(skip(self))]
	pub fn load(&self, refresh: bool) -> SecretsResult<ProviderSecretMap> {
		let mut state = self.lock_state();

		if !refresh {
			if let Some(cache) = &state.cache {
				return Ok(cache.clone());
			}
		}

		self.load_locked(&mut state)
	}

	/// Replace the entire stored map.
	///
	/// Empty and whitespace-only field values are dropped before
	/// persistence. The envelope is staged to a temp file in the same
	/// directory and renamed over the target.
	#[instrument(skip(self, payload))]
	pub fn write(&self, payload: ProviderSecretMap) -> SecretsResult<()> {
		let payload = sanitize_payload(payload)?;

		let mut state = self.lock_state();
		let key = self.active_key_locked(&mut state)?;

		let envelope = envelope::seal_map(self.cipher.as_ref(), &key, &payload)?;
		self.commit_envelope(&envelope)?;

		let providers: Vec<String> = payload.keys().cloned().collect();
		state.cache = Some(payload);

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SecretsWrite)
				.providers(providers)
				.fingerprint(key.fingerprint())
				.build(),
		);

		Ok(())
	}

	/// Merge `fields` into the named provider's entry and persist.
	///
	/// Providers not yet present are created. A blank value removes the
	/// field, per the provider-map invariant.
	#[instrument(skip(self, fields), fields(provider = %provider))]
	pub fn update(
		&self,
		provider: &str,
		fields: BTreeMap<String, String>,
	) -> SecretsResult<()> {
		if provider.trim().is_empty() {
			return Err(SecretStoreError::InvalidPayload(
				"provider name must not be empty".to_string(),
			));
		}

		let mut state = self.lock_state();
		let mut map = self.cached_map_locked(&mut state)?;

		let canonical = stored_provider_name(&map, provider)
			.unwrap_or_else(|| provider.to_string());
		let entry = map.entry(canonical.clone()).or_default();
		for (field, value) in fields {
			entry.insert(field, value);
		}
		entry.retain(|_, v| !v.trim().is_empty());

		let key = self.active_key_locked(&mut state)?;
		let envelope = envelope::seal_map(self.cipher.as_ref(), &key, &map)?;
		self.commit_envelope(&envelope)?;
		state.cache = Some(map);

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SecretsWrite)
				.provider(canonical)
				.fingerprint(key.fingerprint())
				.build(),
		);

		Ok(())
	}

	/// Fetch the stored entry for `provider` with environment overrides
	/// merged in.
	///
	/// Provider names match case-insensitively. Always emits a
	/// `secrets.read` record listing store-backed and override-backed key
	/// names, even when the provider is absent.
	#[instrument(skip(self))]
	pub fn get(&self, provider: &str) -> SecretsResult<BTreeMap<String, String>> {
		let mut state = self.lock_state();
		let map = self.cached_map_locked(&mut state)?;
		drop(state);

		let stored = lookup_provider(&map, provider);
		let overrides = override_fields(provider);

		let stored_keys: Vec<String> = stored.keys().cloned().collect();
		let override_keys: Vec<String> = overrides.keys().cloned().collect();

		let mut merged = stored;
		merged.extend(overrides);

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SecretsRead)
				.provider(provider)
				.keys(stored_keys)
				.overrides(override_keys)
				.build(),
		);

		Ok(merged)
	}

	/// Non-secret introspection for one provider: key names only.
	pub fn describe(&self, provider: &str) -> SecretsResult<ProviderDescription> {
		let mut state = self.lock_state();
		let map = self.cached_map_locked(&mut state)?;
		drop(state);

		Ok(describe_entry(&map, provider))
	}

	/// Describe every stored provider.
	pub fn describe_all(&self) -> SecretsResult<Vec<ProviderDescription>> {
		let mut state = self.lock_state();
		let map = self.cached_map_locked(&mut state)?;
		drop(state);

		Ok(map
			.keys()
			.map(|provider| describe_entry(&map, provider))
			.collect())
	}

	/// The canonical "give me one credential" call for provider adapters.
	///
	/// Precedence: first non-empty environment variable named in
	/// `env_keys`, then the first non-empty stored field among the
	/// caller-supplied `secret_keys` followed by [`DEFAULT_RESOLVE_KEYS`],
	/// then the empty string. Every successful resolution is audited with
	/// its source and key name, never the value.
	#[instrument(skip(self))]
	pub fn resolve(
		&self,
		provider: &str,
		env_keys: &[&str],
		secret_keys: Option<&[&str]>,
	) -> SecretsResult<String> {
		for env_key in env_keys {
			if let Ok(value) = std::env::var(env_key) {
				if !value.trim().is_empty() {
					self.audit.record(
						AuditEvent::builder(AuditEventKind::SecretsRead)
							.provider(provider)
							.keys([*env_key])
							.source("env")
							.build(),
					);
					return Ok(value);
				}
			}
		}

		let mut state = self.lock_state();
		let map = self.cached_map_locked(&mut state)?;
		drop(state);

		let stored = lookup_provider(&map, provider);
		let overrides = override_fields(provider);
		let mut merged = stored;
		merged.extend(overrides.clone());

		let mut candidates: Vec<&str> = secret_keys.unwrap_or_default().to_vec();
		for default_key in DEFAULT_RESOLVE_KEYS {
			if !candidates.contains(default_key) {
				candidates.push(default_key);
			}
		}

		for candidate in candidates {
			if let Some(value) = merged.get(candidate) {
				if !value.trim().is_empty() {
					let source = if overrides.contains_key(candidate) {
						"env"
					} else {
						"store"
					};
					self.audit.record(
						AuditEvent::builder(AuditEventKind::SecretsRead)
							.provider(provider)
							.keys([candidate])
							.source(source)
							.build(),
					);
					return Ok(value.clone());
				}
			}
		}

		Ok(String::new())
	}

	/// Re-encrypt the full map under a new key.
	///
	/// The single most safety-critical operation: load, re-encrypt and
	/// persist run as one transaction under the store lock. The
	/// re-encrypted envelope is staged before the key file advances, and
	/// renamed into place after, so a crash never leaves the key file
	/// pointing at a ciphertext it cannot open.
	///
	/// When the active key came from the environment the replacement is
	/// not persisted; the caller owns distributing it.
	#[instrument(skip(self, new_key))]
	pub fn rotate_key(&self, new_key: Option<EncryptionKey>) -> SecretsResult<EncryptionKey> {
		let mut state = self.lock_state();

		let map = self.cached_map_locked(&mut state)?;
		let old_key = self.active_key_locked(&mut state)?;
		let new_key = new_key.unwrap_or_else(EncryptionKey::generate);

		let envelope = envelope::seal_map(self.cipher.as_ref(), &new_key, &map)?;
		let staged = self.stage_envelope(&envelope)?;

		if !old_key.is_env_supplied() {
			keys::persist_key(&new_key, self.config.primary_key_path())?;
		}

		fs::rename(&staged, self.config.data_path())?;

		state.key = Some(new_key.clone());
		state.cache = Some(map.clone());

		debug!(
			old = %old_key.fingerprint(),
			new = %new_key.fingerprint(),
			"envelope key rotated"
		);

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SecretsKeyRotated)
				.fingerprint(new_key.fingerprint())
				.providers(map.keys().cloned().collect::<Vec<_>>())
				.build(),
		);

		Ok(new_key)
	}

	// =========================================================================
	// Lock-protected internals
	// =========================================================================

	fn lock_state(&self) -> MutexGuard<'_, StoreState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn cached_map_locked(
		&self,
		state: &mut MutexGuard<'_, StoreState>,
	) -> SecretsResult<ProviderSecretMap> {
		if let Some(cache) = &state.cache {
			return Ok(cache.clone());
		}
		self.load_locked(state)
	}

	fn load_locked(
		&self,
		state: &mut MutexGuard<'_, StoreState>,
	) -> SecretsResult<ProviderSecretMap> {
		let path = self.config.data_path();

		if !path.exists() {
			let empty = ProviderSecretMap::new();
			state.cache = Some(empty.clone());
			return Ok(empty);
		}

		let raw = fs::read_to_string(path)?;
		let contents = match envelope::classify(&raw) {
			Ok(contents) => contents,
			Err(e) => {
				self.audit_integrity_failure(&e);
				return Err(e);
			}
		};

		match contents {
			DiskContents::Envelope(sealed) => {
				let key = self.active_key_locked(state)?;
				match envelope::open_map(self.cipher.as_ref(), &key, &sealed) {
					Ok(map) => {
						state.cache = Some(map.clone());
						Ok(map)
					}
					Err(e) => {
						self.audit_integrity_failure(&e);
						Err(e)
					}
				}
			}
			DiskContents::Legacy(map) => self.upgrade_legacy_locked(state, map),
		}
	}

	/// One-time upgrade of a legacy plaintext file: re-encrypt in place
	/// under a freshly resolved or generated key and return the original
	/// values for this call.
	fn upgrade_legacy_locked(
		&self,
		state: &mut MutexGuard<'_, StoreState>,
		map: ProviderSecretMap,
	) -> SecretsResult<ProviderSecretMap> {
		let key = self.active_key_locked(state)?;

		let envelope = envelope::seal_map(self.cipher.as_ref(), &key, &map)?;
		self.commit_envelope(&envelope)?;
		state.cache = Some(map.clone());

		warn!(
			path = %self.config.data_path().display(),
			"legacy plaintext secrets file re-encrypted in place"
		);

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SecretsUpgraded)
				.providers(map.keys().cloned().collect::<Vec<_>>())
				.fingerprint(key.fingerprint())
				.build(),
		);

		Ok(map)
	}

	fn active_key_locked(
		&self,
		state: &mut MutexGuard<'_, StoreState>,
	) -> SecretsResult<EncryptionKey> {
		if let Some(key) = &state.key {
			return Ok(key.clone());
		}

		let key = keys::resolve_key(&self.config, true)?;
		state.key = Some(key.clone());
		Ok(key)
	}

	/// Write the envelope to a temp file in the target directory and fsync
	/// it. Returns the staged path; the caller renames it into place.
	fn stage_envelope(&self, envelope: &SecretsEnvelope) -> SecretsResult<PathBuf> {
		let path = self.config.data_path();
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		let contents = serde_json::to_string_pretty(envelope).map_err(|e| {
			SecretStoreError::Encryption(format!("envelope serialization failed: {e}"))
		})?;

		let temp_path = path.with_extension("json.tmp");
		let mut file = fs::File::create(&temp_path)?;
		file.write_all(contents.as_bytes())?;
		file.sync_all()?;
		drop(file);

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = fs::Permissions::from_mode(0o600);
			if let Err(e) = fs::set_permissions(&temp_path, perms) {
				warn!(path = %temp_path.display(), error = %e, "failed to set envelope permissions to 0600");
			}
		}

		Ok(temp_path)
	}

	fn commit_envelope(&self, envelope: &SecretsEnvelope) -> SecretsResult<()> {
		let staged = self.stage_envelope(envelope)?;
		fs::rename(&staged, self.config.data_path())?;
		Ok(())
	}

	/// Integrity errors are audited before propagation so operators can
	/// distinguish a wrong key from a corrupted file.
	fn audit_integrity_failure(&self, error: &SecretStoreError) {
		if !error.is_integrity() {
			return;
		}

		let mut builder = AuditEvent::builder(AuditEventKind::SecretsDecryptFailed)
			.detail(error.to_string());
		if let SecretStoreError::DecryptFailed { fingerprint } = error {
			builder = builder.fingerprint(fingerprint.clone());
		}
		self.audit.record(builder.build());
	}
}

// =============================================================================
// Helpers
// =============================================================================

fn sanitize_payload(payload: ProviderSecretMap) -> SecretsResult<ProviderSecretMap> {
	let mut out = ProviderSecretMap::new();

	for (provider, fields) in payload {
		if provider.trim().is_empty() {
			return Err(SecretStoreError::InvalidPayload(
				"provider name must not be empty".to_string(),
			));
		}

		let entry: BTreeMap<String, String> = fields
			.into_iter()
			.filter(|(_, value)| !value.trim().is_empty())
			.collect();
		out.insert(provider, entry);
	}

	Ok(out)
}

fn stored_provider_name(map: &ProviderSecretMap, provider: &str) -> Option<String> {
	map
		.keys()
		.find(|name| name.eq_ignore_ascii_case(provider))
		.cloned()
}

fn lookup_provider(map: &ProviderSecretMap, provider: &str) -> BTreeMap<String, String> {
	stored_provider_name(map, provider)
		.and_then(|name| map.get(&name).cloned())
		.unwrap_or_default()
}

/// The environment segment for a provider name: uppercased, with anything
/// outside `[A-Za-z0-9]` folded to `_`.
fn env_segment(provider: &str) -> String {
	provider
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() {
				c.to_ascii_uppercase()
			} else {
				'_'
			}
		})
		.collect()
}

/// Collect `COMFYVN_SECRET_<PROVIDER>_<FIELD>` overrides for a provider.
/// Field names come back lowercased to line up with stored field names.
fn override_fields(provider: &str) -> BTreeMap<String, String> {
	let prefix = format!("{}{}_", OVERRIDE_PREFIX, env_segment(provider));

	std::env::vars()
		.filter(|(name, value)| name.starts_with(&prefix) && !value.trim().is_empty())
		.map(|(name, value)| (name[prefix.len()..].to_ascii_lowercase(), value))
		.filter(|(field, _)| !field.is_empty())
		.collect()
}

fn describe_entry(map: &ProviderSecretMap, provider: &str) -> ProviderDescription {
	let canonical = stored_provider_name(map, provider);
	let stored_keys = canonical
		.as_ref()
		.and_then(|name| map.get(name))
		.map(|entry| entry.keys().cloned().collect())
		.unwrap_or_default();

	ProviderDescription {
		provider: canonical.unwrap_or_else(|| provider.to_string()),
		stored_keys,
		override_keys: override_fields(provider).keys().cloned().collect(),
		present: stored_provider_name(map, provider).is_some(),
	}
}
