// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope cipher seam.
//!
//! The store never talks to a cipher crate directly: it seals and opens the
//! envelope through [`EnvelopeCipher`], so the authenticated-encryption
//! algorithm can be swapped without touching load/write/rotate logic.
//! [`Aes256GcmCipher`] is the default.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{SecretStoreError, SecretsResult};

/// Size of envelope keys in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Seals and opens the secrets envelope under a symmetric key.
///
/// `seal` output is self-contained: whatever framing the algorithm needs
/// (nonces, tags) is part of the returned bytes, so the envelope file only
/// ever stores one opaque blob.
pub trait EnvelopeCipher: Send + Sync {
	/// Algorithm tag written into the envelope metadata.
	fn algorithm(&self) -> &'static str;

	/// Encrypt `plaintext` under `key`.
	fn seal(&self, key: &[u8; KEY_SIZE], plaintext: &[u8]) -> SecretsResult<Vec<u8>>;

	/// Decrypt `sealed` under `key`. Fails when the key is wrong or the
	/// blob has been tampered with.
	fn open(&self, key: &[u8; KEY_SIZE], sealed: &[u8]) -> SecretsResult<Zeroizing<Vec<u8>>>;
}

/// AES-256-GCM cipher with a random 96-bit nonce prepended to the ciphertext.
///
/// Random nonces from OsRng are cryptographically safe at envelope-write
/// volumes; the same (key, nonce) pair must never be reused, and collisions
/// only become a concern after roughly 2^32 seals under one key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes256GcmCipher;

impl Aes256GcmCipher {
	pub fn new() -> Self {
		Self
	}
}

impl EnvelopeCipher for Aes256GcmCipher {
	fn algorithm(&self) -> &'static str {
		"aes-256-gcm"
	}

	fn seal(&self, key: &[u8; KEY_SIZE], plaintext: &[u8]) -> SecretsResult<Vec<u8>> {
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = cipher
			.encrypt(nonce, plaintext)
			.map_err(|e| SecretStoreError::Encryption(format!("envelope seal failed: {e}")))?;

		let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		sealed.extend_from_slice(&nonce_bytes);
		sealed.extend_from_slice(&ciphertext);
		Ok(sealed)
	}

	fn open(&self, key: &[u8; KEY_SIZE], sealed: &[u8]) -> SecretsResult<Zeroizing<Vec<u8>>> {
		if sealed.len() < NONCE_SIZE {
			return Err(SecretStoreError::Malformed(format!(
				"sealed blob too short: {} bytes",
				sealed.len()
			)));
		}

		let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
		let nonce = Nonce::from_slice(nonce_bytes);

		let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
			// The fingerprint is filled in by the store, which knows the
			// active key; the cipher only reports the failure class.
			SecretStoreError::DecryptFailed {
				fingerprint: String::new(),
			}
		})?;

		Ok(Zeroizing::new(plaintext))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn test_key(fill: u8) -> [u8; KEY_SIZE] {
		[fill; KEY_SIZE]
	}

	#[test]
	fn seal_open_roundtrip() {
		let cipher = Aes256GcmCipher::new();
		let key = test_key(7);

		let sealed = cipher.seal(&key, b"provider secrets").unwrap();
		let opened = cipher.open(&key, &sealed).unwrap();

		assert_eq!(opened.as_slice(), b"provider secrets");
	}

	#[test]
	fn wrong_key_fails_open() {
		let cipher = Aes256GcmCipher::new();

		let sealed = cipher.seal(&test_key(1), b"secret").unwrap();
		let result = cipher.open(&test_key(2), &sealed);

		assert!(matches!(
			result,
			Err(SecretStoreError::DecryptFailed { .. })
		));
	}

	#[test]
	fn tampered_blob_fails_open() {
		let cipher = Aes256GcmCipher::new();
		let key = test_key(3);

		let mut sealed = cipher.seal(&key, b"secret").unwrap();
		let last = sealed.len() - 1;
		sealed[last] ^= 0xFF;

		assert!(cipher.open(&key, &sealed).is_err());
	}

	#[test]
	fn truncated_blob_is_malformed() {
		let cipher = Aes256GcmCipher::new();
		let result = cipher.open(&test_key(4), &[0u8; NONCE_SIZE - 1]);
		assert!(matches!(result, Err(SecretStoreError::Malformed(_))));
	}

	#[test]
	fn algorithm_tag_is_stable() {
		assert_eq!(Aes256GcmCipher::new().algorithm(), "aes-256-gcm");
	}

	proptest! {
		#[test]
		fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..10000)) {
			let cipher = Aes256GcmCipher::new();
			let key = test_key(9);

			let sealed = cipher.seal(&key, &plaintext).unwrap();
			let opened = cipher.open(&key, &sealed).unwrap();

			prop_assert_eq!(plaintext, opened.as_slice());
		}

		#[test]
		fn prop_same_plaintext_different_seals(plaintext in proptest::collection::vec(any::<u8>(), 1..1000)) {
			let cipher = Aes256GcmCipher::new();
			let key = test_key(11);

			let a = cipher.seal(&key, &plaintext).unwrap();
			let b = cipher.seal(&key, &plaintext).unwrap();

			prop_assert_ne!(a, b);
		}

		#[test]
		fn prop_tamper_rejected(
			plaintext in proptest::collection::vec(any::<u8>(), 1..1000),
			tamper_idx in 0usize..2000usize,
		) {
			let cipher = Aes256GcmCipher::new();
			let key = test_key(13);

			let mut sealed = cipher.seal(&key, &plaintext).unwrap();
			let idx = tamper_idx % sealed.len();
			sealed[idx] ^= 0xFF;

			prop_assert!(cipher.open(&key, &sealed).is_err());
		}
	}
}
