// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fan-out of audit records to sinks and hooks.

use std::sync::Arc;

use tracing::warn;

use crate::event::AuditEvent;
use crate::hooks::HookBus;
use crate::sink::AuditSink;

/// The audit entry point handed to the secret store and the sandbox.
///
/// Records fan out to every configured sink and then to hook subscribers.
/// One failing sink never blocks the others, and neither sinks nor hooks
/// can fail the operation being audited.
#[derive(Clone)]
pub struct AuditLog {
	sinks: Vec<Arc<dyn AuditSink>>,
	hooks: Arc<HookBus>,
}

impl AuditLog {
	/// Create a log writing to the given sinks.
	pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		Self {
			sinks,
			hooks: Arc::new(HookBus::new()),
		}
	}

	/// Create a log with no sinks and no hooks. Useful for tests and for
	/// callers that only want the store's return values.
	pub fn disabled() -> Self {
		Self::new(Vec::new())
	}

	/// Create a log sharing an externally owned hook bus.
	pub fn with_hooks(sinks: Vec<Arc<dyn AuditSink>>, hooks: Arc<HookBus>) -> Self {
		Self { sinks, hooks }
	}

	/// The hook bus records are dispatched to.
	pub fn hooks(&self) -> &Arc<HookBus> {
		&self.hooks
	}

	/// Record one event.
	pub fn record(&self, event: AuditEvent) {
		for sink in &self.sinks {
			if let Err(e) = sink.emit(&event) {
				warn!(sink = sink.name(), error = %e, "audit sink emit failed");
			}
		}

		self.hooks.dispatch(&event);
	}
}
