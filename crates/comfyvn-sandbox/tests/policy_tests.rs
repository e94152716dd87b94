// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end sandbox scenarios: policy installation, guarded connects
//! and the audit/hook fan-out on denial.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use comfyvn_audit::{AuditEventKind, AuditLog, MemorySink};
use comfyvn_sandbox::{
	parse_network_rule, Connector, GuardedConnector, NetworkGuard, NetworkPolicyHandle,
};
use tokio::net::TcpListener;

fn handle_with_sink() -> (Arc<NetworkPolicyHandle>, Arc<MemorySink>) {
	let sink = Arc::new(MemorySink::new());
	let handle = Arc::new(NetworkPolicyHandle::new(AuditLog::new(vec![sink.clone()])));
	(handle, sink)
}

#[tokio::test]
async fn allowed_endpoint_connects_and_denied_endpoint_raises() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();

	let (handle, sink) = handle_with_sink();
	handle.apply_network_policy(
		true,
		&[
			format!("127.0.0.1:{port}"),
			"*.internal.example".to_string(),
		],
	);

	let connector = GuardedConnector::direct(Arc::clone(&handle));

	// The allowed endpoint reaches the listener.
	let accept = tokio::spawn(async move { listener.accept().await });
	connector.connect("127.0.0.1", port).await.unwrap();
	accept.await.unwrap().unwrap();

	// The denied endpoint raises and produces exactly one blocked record.
	let err = connector.connect("evil.example", 443).await.unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
	assert_eq!(sink.count_of(AuditEventKind::SandboxNetworkBlocked), 1);
}

#[tokio::test]
async fn disabled_policy_denies_everything_including_localhost() {
	let (handle, _) = handle_with_sink();
	handle.apply_network_policy(false, &["localhost".to_string(), "*".to_string()]);

	for (host, port) in [("localhost", 80), ("127.0.0.1", 8188), ("example.com", 443)] {
		assert!(!handle.allowed(host, port), "{host}:{port} should be denied");
	}

	let connector = GuardedConnector::direct(Arc::clone(&handle));
	let err = connector.connect("localhost", 80).await.unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);
}

#[test]
fn wildcard_rules_cover_subdomains_only() {
	let rule = parse_network_rule("*.example.com").unwrap();
	let guard = NetworkGuard::new(vec![rule]);

	assert!(guard.allowed("api.example.com", 443));
	assert!(guard.allowed("a.b.example.com", 443));
	assert!(!guard.allowed("example.com", 443));
	assert!(!guard.allowed("notexample.com", 443));
}

#[test]
fn ipv6_rules_parse_and_match_exact_ports() {
	let rule = parse_network_rule("[::1]:9000").unwrap();
	assert_eq!(rule.host_pattern, "::1");
	assert_eq!(rule.port, Some(9000));

	let guard = NetworkGuard::new(vec![rule]);
	assert!(guard.allowed("::1", 9000));
	assert!(!guard.allowed("::1", 9001));
}

#[tokio::test]
async fn blocked_hook_fires_once_per_denial() {
	let (handle, _) = handle_with_sink();
	handle.apply_network_policy(true, &["allowed.example".to_string()]);

	let hits = Arc::new(AtomicUsize::new(0));
	let hits_clone = Arc::clone(&hits);
	handle
		.audit()
		.hooks()
		.subscribe("sandbox.network.blocked", move |event| {
			assert!(event.host.is_some());
			assert!(event.port.is_some());
			hits_clone.fetch_add(1, Ordering::SeqCst);
		});

	let connector = GuardedConnector::direct(Arc::clone(&handle));
	let _ = connector.connect("evil.example", 443).await;
	let _ = connector.connect("evil.example", 8443).await;

	assert_eq!(hits.load(Ordering::SeqCst), 2);
}
