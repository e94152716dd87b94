// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for audit emission.

use thiserror::Error;

/// Result type alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors that can occur while emitting an audit record.
#[derive(Debug, Error)]
pub enum AuditError {
	#[error("failed to write audit record: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to serialize audit record: {0}")]
	Serialization(#[from] serde_json::Error),
}
