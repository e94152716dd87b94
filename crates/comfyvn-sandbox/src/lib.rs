// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ComfyVN Network Sandbox
//!
//! Process-wide outbound-network allow-listing:
//!
//! - **Rules**: normalized `(host_pattern, port)` entries parsed from bare
//!   hosts, `host:port`, bracketed IPv6 and full URLs, with `*.` subdomain
//!   wildcards and a `localhost` alias class
//! - **Guard**: [`NetworkGuard`] answers `allowed(host, port)`; default
//!   posture is deny
//! - **Handle**: [`NetworkPolicyHandle`] owns the single active guard and
//!   replaces it wholesale on [`NetworkPolicyHandle::apply_network_policy`]
//! - **Connector seam**: all outbound connections route through
//!   [`Connector`]; [`GuardedConnector`] is the enforcement point
//!
//! Denials raise [`SandboxError::Blocked`], emit one
//! `sandbox.network.blocked` audit record and fire the blocked hooks —
//! with host and port only, never payload contents.

pub mod connector;
pub mod error;
pub mod guard;
pub mod rule;

pub use connector::{Connector, GuardedConnector, TcpConnector};
pub use error::{SandboxError, SandboxResult};
pub use guard::{NetworkGuard, NetworkGuardPolicy, NetworkPolicyHandle};
pub use rule::{parse_network_rule, NetworkRule};
