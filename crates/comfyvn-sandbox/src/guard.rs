// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The active network guard and its process-wide policy handle.
//!
//! Default posture is deny: an empty or disabled guard blocks everything.
//! The handle is constructed explicitly and injected into whatever owns
//! outbound connections; it holds exactly one guard at a time, replaced
//! wholesale by [`NetworkPolicyHandle::apply_network_policy`]. The check
//! itself is a short list scan under a read lock — no I/O, never blocks.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use comfyvn_audit::{AuditEvent, AuditEventKind, AuditLog};

use crate::error::{SandboxError, SandboxResult};
use crate::rule::{parse_network_rule, NetworkRule};

/// Declarative policy: enabled flag plus allow rules.
///
/// When `enabled` is false the rule list is irrelevant — everything is
/// denied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkGuardPolicy {
	pub enabled: bool,
	#[serde(default)]
	pub rules: Vec<NetworkRule>,
}

/// An immutable rule set answering `allowed(host, port)`.
#[derive(Debug, Clone, Default)]
pub struct NetworkGuard {
	rules: Vec<NetworkRule>,
}

impl NetworkGuard {
	pub fn new(rules: Vec<NetworkRule>) -> Self {
		Self { rules }
	}

	/// A guard that denies everything.
	pub fn deny_all() -> Self {
		Self::default()
	}

	/// The rules in effect.
	pub fn rules(&self) -> &[NetworkRule] {
		&self.rules
	}

	/// True when some rule allows `host:port`. An empty host or an empty
	/// rule list denies.
	pub fn allowed(&self, host: &str, port: u16) -> bool {
		if host.is_empty() || self.rules.is_empty() {
			return false;
		}
		self.rules.iter().any(|rule| rule.matches(host, port))
	}
}

/// Process-wide holder of the active guard.
///
/// Lifecycle: deny-all on construction, then
/// `Installed(deny-all) → Installed(policy R)` transitions only through
/// [`Self::apply_network_policy`]. Reinstallation fully replaces the prior
/// guard; rules never accumulate across calls.
pub struct NetworkPolicyHandle {
	guard: RwLock<Arc<NetworkGuard>>,
	audit: AuditLog,
}

impl NetworkPolicyHandle {
	/// Create a handle in the deny-all state.
	pub fn new(audit: AuditLog) -> Self {
		Self {
			guard: RwLock::new(Arc::new(NetworkGuard::deny_all())),
			audit,
		}
	}

	/// Install a new policy from raw rule strings, replacing the previous
	/// guard wholesale.
	///
	/// With `enabled` false the rule list is ignored and the guard denies
	/// everything. Unparseable rule strings are skipped with a warning.
	pub fn apply_network_policy(&self, enabled: bool, allow_rules: &[String]) {
		let rules = if enabled {
			let mut parsed = Vec::with_capacity(allow_rules.len());
			for raw in allow_rules {
				match parse_network_rule(raw) {
					Ok(rule) => parsed.push(rule),
					Err(e) => warn!(rule = %raw, error = %e, "skipping invalid network rule"),
				}
			}
			parsed
		} else {
			Vec::new()
		};

		info!(enabled, rule_count = rules.len(), "network policy installed");

		let mut guard = self.guard.write().unwrap_or_else(|e| e.into_inner());
		*guard = Arc::new(NetworkGuard::new(rules));
	}

	/// Install an already-parsed policy.
	pub fn install(&self, policy: NetworkGuardPolicy) {
		let rules = if policy.enabled { policy.rules } else { Vec::new() };
		info!(
			enabled = policy.enabled,
			rule_count = rules.len(),
			"network policy installed"
		);

		let mut guard = self.guard.write().unwrap_or_else(|e| e.into_inner());
		*guard = Arc::new(NetworkGuard::new(rules));
	}

	/// Snapshot of the active guard.
	pub fn guard(&self) -> Arc<NetworkGuard> {
		Arc::clone(&self.guard.read().unwrap_or_else(|e| e.into_inner()))
	}

	/// Cheap hot-path check.
	pub fn allowed(&self, host: &str, port: u16) -> bool {
		self.guard().allowed(host, port)
	}

	/// Check and raise.
	///
	/// Denial produces one `sandbox.network.blocked` audit record (host
	/// and port only, never payloads), fires the blocked hooks, and
	/// returns [`SandboxError::Blocked`].
	pub fn check(&self, host: &str, port: u16) -> SandboxResult<()> {
		if self.allowed(host, port) {
			return Ok(());
		}

		self.audit.record(
			AuditEvent::builder(AuditEventKind::SandboxNetworkBlocked)
				.endpoint(host, port)
				.build(),
		);

		Err(SandboxError::Blocked {
			host: host.to_string(),
			port,
		})
	}

	/// The audit log denials are reported to.
	pub fn audit(&self) -> &AuditLog {
		&self.audit
	}
}
