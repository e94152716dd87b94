// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ComfyVN Secret Store
//!
//! Encrypted, provider-keyed credential storage for ComfyVN:
//!
//! - **Envelope encryption**: one AES-256-GCM envelope holds the whole
//!   provider map; the envelope file is the only on-disk representation
//! - **Key resolution**: env var → key file → generated-and-persisted
//! - **Overrides**: `COMFYVN_SECRET_<PROVIDER>_<FIELD>` supersedes stored
//!   fields at read time without touching the envelope
//! - **Audit integration**: every read, write, rotation, upgrade and
//!   decrypt failure is recorded through `comfyvn-audit`
//!
//! # Security Design
//!
//! - Key material lives in [`Zeroizing`](zeroize::Zeroizing) buffers and is
//!   exposed to logs only as a 16-hex-char fingerprint
//! - Persistence is atomic-by-rename; a crash or concurrent reader never
//!   observes a half-written envelope
//! - `rotate_key` stages the re-encrypted envelope before the key file
//!   advances, so key and ciphertext can never diverge on disk

pub mod cipher;
pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod store;

pub use cipher::{Aes256GcmCipher, EnvelopeCipher, KEY_SIZE, NONCE_SIZE};
pub use config::{
	SecretsConfig, DATA_PATH_ENV_VAR, KEY_ENV_VAR, KEY_FILE_ENV_VAR, OVERRIDE_PREFIX,
};
pub use envelope::{ProviderSecretMap, SecretsEnvelope, ENVELOPE_VERSION};
pub use error::{SecretStoreError, SecretsResult};
pub use keys::{EncryptionKey, KeySource};
pub use store::{ProviderDescription, SecretStore, DEFAULT_RESOLVE_KEYS};
