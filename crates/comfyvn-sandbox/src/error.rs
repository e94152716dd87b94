// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the network sandbox.

use thiserror::Error;

/// Result type alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors raised by the network sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
	/// The intended, expected failure mode for unauthorized egress.
	/// Raised synchronously at the point of the blocked connect and never
	/// swallowed by the interception layer.
	#[error("outbound connection to {host}:{port} blocked by network sandbox")]
	Blocked { host: String, port: u16 },

	/// A rule string that could not be parsed. Callers skip the rule and
	/// log a warning.
	#[error("invalid network rule {rule:?}: {reason}")]
	InvalidRule { rule: String, reason: String },
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blocked_error_names_the_endpoint() {
		let err = SandboxError::Blocked {
			host: "evil.example".to_string(),
			port: 443,
		};
		assert_eq!(
			err.to_string(),
			"outbound connection to evil.example:443 blocked by network sandbox"
		);
	}
}
