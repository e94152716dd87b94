// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The outbound connection seam.
//!
//! Every component that opens an outbound TCP connection routes through a
//! [`Connector`] instead of reaching for socket primitives. The
//! [`GuardedConnector`] is the enforcement point: it consults the active
//! [`NetworkPolicyHandle`] before delegating to the real connector, so the
//! sandbox covers every caller regardless of which library sits above it.
//!
//! A denied attempt surfaces as an `io::Error` of kind `PermissionDenied`
//! wrapping [`SandboxError::Blocked`]; the audit record and blocked hooks
//! fire inside the policy check.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::guard::NetworkPolicyHandle;

/// Opens outbound TCP connections.
#[async_trait]
pub trait Connector: Send + Sync {
	/// Connect to `host:port`.
	async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream>;
}

/// Direct connector with no policy enforcement.
///
/// Only the [`GuardedConnector`] should wrap this; handing it out raw
/// bypasses the sandbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl TcpConnector {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Connector for TcpConnector {
	async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
		TcpStream::connect((host, port)).await
	}
}

/// Connector that enforces the active network policy.
pub struct GuardedConnector {
	policy: Arc<NetworkPolicyHandle>,
	inner: Arc<dyn Connector>,
}

impl GuardedConnector {
	/// Wrap an inner connector with policy enforcement.
	pub fn new(policy: Arc<NetworkPolicyHandle>, inner: Arc<dyn Connector>) -> Self {
		Self { policy, inner }
	}

	/// Guarded connector over a plain TCP connector.
	pub fn direct(policy: Arc<NetworkPolicyHandle>) -> Self {
		Self::new(policy, Arc::new(TcpConnector::new()))
	}

	/// The policy handle consulted on every connect.
	pub fn policy(&self) -> &Arc<NetworkPolicyHandle> {
		&self.policy
	}
}

#[async_trait]
impl Connector for GuardedConnector {
	async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
		self
			.policy
			.check(host, port)
			.map_err(|e| io::Error::new(io::ErrorKind::PermissionDenied, e))?;

		debug!(host, port, "outbound connection allowed");
		self.inner.connect(host, port).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::SandboxError;
	use comfyvn_audit::{AuditEventKind, AuditLog, MemorySink};
	use tokio::net::TcpListener;

	fn guarded(sink: Arc<MemorySink>) -> (GuardedConnector, Arc<NetworkPolicyHandle>) {
		let policy = Arc::new(NetworkPolicyHandle::new(AuditLog::new(vec![sink])));
		let connector = GuardedConnector::direct(Arc::clone(&policy));
		(connector, policy)
	}

	#[tokio::test]
	async fn allowed_connect_reaches_the_listener() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let sink = Arc::new(MemorySink::new());
		let (connector, policy) = guarded(sink.clone());
		policy.apply_network_policy(true, &[format!("127.0.0.1:{port}")]);

		let accept = tokio::spawn(async move { listener.accept().await });
		let stream = connector.connect("127.0.0.1", port).await.unwrap();
		assert!(stream.peer_addr().is_ok());
		accept.await.unwrap().unwrap();

		assert_eq!(sink.count_of(AuditEventKind::SandboxNetworkBlocked), 0);
	}

	#[tokio::test]
	async fn denied_connect_raises_before_touching_the_network() {
		let sink = Arc::new(MemorySink::new());
		let (connector, policy) = guarded(sink.clone());
		policy.apply_network_policy(true, &["allowed.example".to_string()]);

		// The host does not resolve; a policy hit would error differently.
		let err = connector.connect("evil.example", 443).await.unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

		let inner = err.into_inner().unwrap();
		let blocked = inner.downcast::<SandboxError>().unwrap();
		match *blocked {
			SandboxError::Blocked { ref host, port } => {
				assert_eq!(host, "evil.example");
				assert_eq!(port, 443);
			}
			ref other => panic!("expected Blocked, got {other:?}"),
		}

		assert_eq!(sink.count_of(AuditEventKind::SandboxNetworkBlocked), 1);
	}

	#[tokio::test]
	async fn deny_all_blocks_loopback_too() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let sink = Arc::new(MemorySink::new());
		let (connector, policy) = guarded(sink.clone());
		policy.apply_network_policy(false, &[format!("127.0.0.1:{port}")]);

		let err = connector.connect("127.0.0.1", port).await.unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
	}

	#[tokio::test]
	async fn policy_swap_applies_to_existing_connectors() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();

		let sink = Arc::new(MemorySink::new());
		let (connector, policy) = guarded(sink);

		assert!(connector.connect("127.0.0.1", port).await.is_err());

		policy.apply_network_policy(true, &["localhost".to_string()]);

		let accept = tokio::spawn(async move { listener.accept().await });
		connector.connect("127.0.0.1", port).await.unwrap();
		accept.await.unwrap().unwrap();
	}
}
