// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret wrapper type that keeps provider credentials out of logs and dumps.
//!
//! Every credential field that passes through the ComfyVN trust boundary is
//! carried as a [`Secret<T>`], which guarantees:
//!
//! - Redacted `Debug`/`Display` output, so `tracing` fields never leak
//! - Redacted `Serialize`, so config dumps and API responses stay clean
//! - Zeroized memory on drop
//! - Access only through an explicit `.expose()` call, visible in review
//!
//! # Example
//!
//! ```
//! use comfyvn_common_secret::Secret;
//!
//! let api_key = Secret::new("sk-provider-key".to_string());
//!
//! assert_eq!(format!("{:?}", api_key), "Secret(\"[REDACTED]\")");
//! assert_eq!(format!("{}", api_key), "[REDACTED]");
//! assert_eq!(api_key.expose(), "sk-provider-key");
//! ```
//!
//! With `tracing`, both the display (`%`) and debug (`?`) field shorthands
//! go through the redacted impls, so structured logging is safe:
//!
//! ```
//! use comfyvn_common_secret::Secret;
//! use tracing::info;
//!
//! let api_key = Secret::new("sk-provider-key".to_string());
//!
//! // Both log "[REDACTED]" instead of the actual key.
//! info!(api_key = %api_key, "provider configured");
//! info!(?api_key, "debug form is redacted too");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// The placeholder emitted wherever a secret would otherwise appear.
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper for sensitive values that prevents accidental exposure.
///
/// There is intentionally no `Deref` impl: call sites must opt in to seeing
/// the value via [`Secret::expose`], which keeps secret access greppable.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Convenience alias for the common case of secret strings.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	/// Wrap a sensitive value.
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Explicitly access the inner value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Mutable access to the inner value. Prefer [`Secret::expose`].
	pub fn expose_mut(&mut self) -> &mut T {
		&mut self.inner
	}

	/// Consume the wrapper and return the inner value.
	///
	/// Clones rather than moves so the original allocation is still
	/// zeroized when the wrapper drops.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// True when the wrapped string is empty after trimming.
	///
	/// Used by credential resolution to treat `FOO=""` the same as unset.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Secret::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			let inner = T::deserialize(deserializer)?;
			Ok(Secret::new(inner))
		}
	}
}
