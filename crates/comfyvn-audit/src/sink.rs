// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit sink implementations.
//!
//! A sink receives every record accepted by the [`crate::AuditLog`]. All
//! sinks are synchronous: audit emission sits inside the secret store's
//! lock-protected operations and must not introduce async plumbing there.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::AuditResult;
use crate::event::{AuditEvent, AuditSeverity};

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
	/// Short sink name used in failure diagnostics.
	fn name(&self) -> &str;

	/// Append one record. Failures are reported to the caller, which logs
	/// them and continues with the remaining sinks.
	fn emit(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// Newline-delimited JSON file sink.
///
/// The file is opened lazily in append mode and each record is flushed so a
/// crash never loses more than the in-flight line.
pub struct JsonLinesSink {
	path: PathBuf,
	handle: Mutex<Option<File>>,
}

impl JsonLinesSink {
	/// Create a sink appending to the given path.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			handle: Mutex::new(None),
		}
	}

	/// Path the sink appends to.
	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl AuditSink for JsonLinesSink {
	fn name(&self) -> &str {
		"json-lines"
	}

	fn emit(&self, event: &AuditEvent) -> AuditResult<()> {
		let line = format!("{}\n", serde_json::to_string(event)?);

		let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
		if guard.is_none() {
			if let Some(parent) = self.path.parent() {
				std::fs::create_dir_all(parent)?;
			}
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&self.path)?;
			*guard = Some(file);
		}

		if let Some(file) = guard.as_mut() {
			file.write_all(line.as_bytes())?;
			file.flush()?;
		}
		Ok(())
	}
}

/// Sink that forwards records to the `tracing` subscriber.
///
/// Warning-or-worse records log at warn level so blocked connections and
/// decrypt failures surface in ordinary application logs.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
	pub fn new() -> Self {
		Self
	}
}

impl AuditSink for TracingSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn emit(&self, event: &AuditEvent) -> AuditResult<()> {
		if event.severity >= AuditSeverity::Warning {
			warn!(
				event = %event.event,
				provider = event.provider.as_deref(),
				host = event.host.as_deref(),
				port = event.port,
				detail = event.detail.as_deref(),
				"audit"
			);
		} else {
			info!(
				event = %event.event,
				provider = event.provider.as_deref(),
				fingerprint = event.fingerprint.as_deref(),
				"audit"
			);
		}
		Ok(())
	}
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
	events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of all captured records.
	pub fn events(&self) -> Vec<AuditEvent> {
		self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Number of captured records of the given kind.
	pub fn count_of(&self, kind: crate::event::AuditEventKind) -> usize {
		self.events
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.iter()
			.filter(|e| e.event == kind)
			.count()
	}
}

impl AuditSink for MemorySink {
	fn name(&self) -> &str {
		"memory"
	}

	fn emit(&self, event: &AuditEvent) -> AuditResult<()> {
		self.events
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(event.clone());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::AuditEventKind;

	#[test]
	fn json_lines_sink_appends_one_line_per_record() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("audit.jsonl");
		let sink = JsonLinesSink::new(&path);

		for provider in ["openai", "stability"] {
			let event = AuditEvent::builder(AuditEventKind::SecretsRead)
				.provider(provider)
				.build();
			sink.emit(&event).unwrap();
		}

		let contents = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = contents.lines().collect();
		assert_eq!(lines.len(), 2);

		let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
		assert_eq!(first["event"], "secrets.read");
		assert_eq!(first["provider"], "openai");
	}

	#[test]
	fn json_lines_sink_creates_parent_directories() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("audit.jsonl");
		let sink = JsonLinesSink::new(&path);

		let event = AuditEvent::builder(AuditEventKind::SecretsWrite).build();
		sink.emit(&event).unwrap();

		assert!(path.exists());
	}

	#[test]
	fn memory_sink_counts_by_kind() {
		let sink = MemorySink::new();
		sink.emit(&AuditEvent::builder(AuditEventKind::SecretsRead).build())
			.unwrap();
		sink.emit(&AuditEvent::builder(AuditEventKind::SecretsRead).build())
			.unwrap();
		sink.emit(&AuditEvent::builder(AuditEventKind::SecretsWrite).build())
			.unwrap();

		assert_eq!(sink.count_of(AuditEventKind::SecretsRead), 2);
		assert_eq!(sink.count_of(AuditEventKind::SecretsWrite), 1);
		assert_eq!(sink.count_of(AuditEventKind::SecretsUpgraded), 0);
	}

	#[test]
	fn tracing_sink_accepts_all_severities() {
		let sink = TracingSink::new();
		sink.emit(
			&AuditEvent::builder(AuditEventKind::SandboxNetworkBlocked)
				.endpoint("evil.example", 443)
				.build(),
		)
		.unwrap();
		sink.emit(&AuditEvent::builder(AuditEventKind::SecretsRead).build())
			.unwrap();
	}
}
