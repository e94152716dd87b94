// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for the audit trail.
//!
//! - [`AuditEventKind`]: the closed set of auditable events
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditEvent`]: a single append-only record
//! - [`AuditEventBuilder`]: fluent construction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Events recorded by the trust boundary core.
///
/// The serialized form is the dot-separated wire name consumed by log
/// tooling and hook subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventKind {
	// Secret store events
	#[serde(rename = "secrets.read")]
	SecretsRead,
	#[serde(rename = "secrets.write")]
	SecretsWrite,
	#[serde(rename = "secrets.key.rotated")]
	SecretsKeyRotated,
	#[serde(rename = "secrets.upgraded")]
	SecretsUpgraded,
	#[serde(rename = "secrets.decrypt.failed")]
	SecretsDecryptFailed,

	// Network sandbox events
	#[serde(rename = "sandbox.network.blocked")]
	SandboxNetworkBlocked,
}

impl AuditEventKind {
	/// The dot-separated wire name for this event.
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditEventKind::SecretsRead => "secrets.read",
			AuditEventKind::SecretsWrite => "secrets.write",
			AuditEventKind::SecretsKeyRotated => "secrets.key.rotated",
			AuditEventKind::SecretsUpgraded => "secrets.upgraded",
			AuditEventKind::SecretsDecryptFailed => "secrets.decrypt.failed",
			AuditEventKind::SandboxNetworkBlocked => "sandbox.network.blocked",
		}
	}

	/// Returns the default severity for this event kind.
	///
	/// - `Info`: normal operations (reads, writes, rotation, upgrade)
	/// - `Warning`: security-relevant failures (decrypt failure, blocked
	///   connection attempt)
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventKind::SecretsRead
			| AuditEventKind::SecretsWrite
			| AuditEventKind::SecretsKeyRotated
			| AuditEventKind::SecretsUpgraded => AuditSeverity::Info,

			AuditEventKind::SecretsDecryptFailed | AuditEventKind::SandboxNetworkBlocked => {
				AuditSeverity::Warning
			}
		}
	}
}

impl fmt::Display for AuditEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Severity levels for audit events, compatible with RFC 5424 syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	/// Returns the RFC 5424 numeric severity code.
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity (Critical=2 > Debug=7)
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

/// A single audit record.
///
/// Invariant: records carry metadata only — key names, provider names, key
/// fingerprints, endpoint coordinates. Secret values never enter an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
	/// Unique identifier for this record.
	pub id: Uuid,
	/// The event kind (serialized as its wire name).
	pub event: AuditEventKind,
	/// When the event occurred.
	pub timestamp: DateTime<Utc>,
	/// Severity of this record.
	pub severity: AuditSeverity,

	/// Provider namespace affected, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
	/// Provider namespaces affected by a bulk operation (write, rotation).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub providers: Option<Vec<String>>,
	/// Names of the stored fields involved (never their values).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub keys: Option<Vec<String>>,
	/// Names of fields supplied via environment override.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub overrides: Option<Vec<String>>,
	/// Fingerprint of the encryption key in effect.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fingerprint: Option<String>,
	/// Where a resolved credential came from (`env` or `store`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	/// Target host for network events.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	/// Target port for network events.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	/// Free-form diagnostic detail (already sanitized by the producer).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
}

impl AuditEvent {
	/// Start building an event of the given kind.
	pub fn builder(event: AuditEventKind) -> AuditEventBuilder {
		AuditEventBuilder::new(event)
	}
}

/// Builder for [`AuditEvent`] with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
	event: AuditEventKind,
	severity: Option<AuditSeverity>,
	provider: Option<String>,
	providers: Option<Vec<String>>,
	keys: Option<Vec<String>>,
	overrides: Option<Vec<String>>,
	fingerprint: Option<String>,
	source: Option<String>,
	host: Option<String>,
	port: Option<u16>,
	detail: Option<String>,
}

impl AuditEventBuilder {
	fn new(event: AuditEventKind) -> Self {
		Self {
			event,
			severity: None,
			provider: None,
			providers: None,
			keys: None,
			overrides: None,
			fingerprint: None,
			source: None,
			host: None,
			port: None,
			detail: None,
		}
	}

	/// Override the default severity for the event kind.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	/// Set the provider namespace.
	pub fn provider(mut self, provider: impl Into<String>) -> Self {
		self.provider = Some(provider.into());
		self
	}

	/// Record the providers affected by a bulk operation.
	pub fn providers<I, S>(mut self, providers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.providers = Some(providers.into_iter().map(Into::into).collect());
		self
	}

	/// Record the names of the stored fields involved.
	pub fn keys<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.keys = Some(keys.into_iter().map(Into::into).collect());
		self
	}

	/// Record the names of environment-overridden fields.
	pub fn overrides<I, S>(mut self, overrides: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.overrides = Some(overrides.into_iter().map(Into::into).collect());
		self
	}

	/// Set the key fingerprint in effect.
	pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
		self.fingerprint = Some(fingerprint.into());
		self
	}

	/// Set the credential source (`env` or `store`).
	pub fn source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());
		self
	}

	/// Set the network endpoint for sandbox events.
	pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
		self.host = Some(host.into());
		self.port = Some(port);
		self
	}

	/// Attach sanitized diagnostic detail.
	pub fn detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());
		self
	}

	/// Build the record, stamping id and timestamp.
	pub fn build(self) -> AuditEvent {
		AuditEvent {
			id: Uuid::new_v4(),
			event: self.event,
			timestamp: Utc::now(),
			severity: self
				.severity
				.unwrap_or_else(|| self.event.default_severity()),
			provider: self.provider,
			providers: self.providers,
			keys: self.keys,
			overrides: self.overrides,
			fingerprint: self.fingerprint,
			source: self.source,
			host: self.host,
			port: self.port,
			detail: self.detail,
		}
	}
}
