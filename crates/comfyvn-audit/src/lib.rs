// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit trail for the ComfyVN trust boundary.
//!
//! Every security-relevant operation in the secret store and the network
//! sandbox produces an [`AuditEvent`]:
//!
//! - **Event model**: [`AuditEventKind`] with dot-separated wire names
//!   (`secrets.read`, `sandbox.network.blocked`), RFC 5424-style severities
//! - **Sinks**: [`AuditSink`] implementations for newline-delimited JSON
//!   files, tracing output, and in-memory capture for tests
//! - **Hooks**: [`HookBus`] for external subscribers keyed by event name
//!
//! # Security Design
//!
//! Audit records carry key *names*, provider names, and key fingerprints —
//! never secret values. Sink and hook failures are best-effort: they are
//! logged and can never break the operation being audited.

pub mod error;
pub mod event;
pub mod hooks;
pub mod log;
pub mod sink;

pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, AuditEventBuilder, AuditEventKind, AuditSeverity};
pub use hooks::HookBus;
pub use log::AuditLog;
pub use sink::{AuditSink, JsonLinesSink, MemorySink, TracingSink};
