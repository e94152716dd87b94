// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! External hook dispatch keyed by event name.
//!
//! Collaborators outside the trust boundary (the GUI, route handlers)
//! subscribe to audit events by wire name. Dispatch is best-effort: a hook
//! that panics is caught and logged at debug level so it can never break
//! the secret read/write or connection check that produced the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

use tracing::debug;

use crate::event::AuditEvent;

type HookFn = Box<dyn Fn(&AuditEvent) + Send + Sync>;

struct Subscription {
	pattern: String,
	callback: HookFn,
}

/// Subscriber registry keyed by event wire name.
///
/// The pattern `"*"` subscribes to every event; any other pattern matches
/// the event name exactly.
#[derive(Default)]
pub struct HookBus {
	subscriptions: RwLock<Vec<Subscription>>,
}

impl HookBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a callback for events matching `pattern`.
	pub fn subscribe<F>(&self, pattern: impl Into<String>, callback: F)
	where
		F: Fn(&AuditEvent) + Send + Sync + 'static,
	{
		let mut subs = self
			.subscriptions
			.write()
			.unwrap_or_else(|e| e.into_inner());
		subs.push(Subscription {
			pattern: pattern.into(),
			callback: Box::new(callback),
		});
	}

	/// Dispatch an event to every matching subscriber.
	pub fn dispatch(&self, event: &AuditEvent) {
		let subs = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
		let name = event.event.as_str();

		for sub in subs.iter() {
			if sub.pattern != "*" && sub.pattern != name {
				continue;
			}

			if catch_unwind(AssertUnwindSafe(|| (sub.callback)(event))).is_err() {
				debug!(event = name, pattern = %sub.pattern, "audit hook panicked");
			}
		}
	}

	/// Number of registered subscriptions.
	pub fn len(&self) -> usize {
		self.subscriptions
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
