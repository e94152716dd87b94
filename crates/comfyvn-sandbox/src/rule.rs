// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Network allow-list rules.
//!
//! A rule is a normalized `(host_pattern, port)` pair parsed from one of
//! four surface forms:
//!
//! - bare host: `api.example.com`
//! - host and port: `api.example.com:443`
//! - bracketed IPv6 with optional port: `[::1]:8080`
//! - full URL: `https://example.com:8443/path` (only host and
//!   scheme-implied or explicit port are kept)
//!
//! A leading `*.` makes the pattern a subdomain wildcard, `*` alone
//! matches any host, and the literal `localhost` also covers `127.0.0.1`
//! and `::1`.

use serde::{Deserialize, Serialize};

use crate::error::{SandboxError, SandboxResult};

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
	/// Exact host, `*`, `*.suffix` wildcard, or `localhost`.
	pub host_pattern: String,
	/// Exact port to match; `None` matches any port.
	pub port: Option<u16>,
}

impl NetworkRule {
	/// Create a rule. Patterns are case-insensitive and stored lowercase.
	pub fn new(host_pattern: impl Into<String>, port: Option<u16>) -> Self {
		Self {
			host_pattern: host_pattern.into().to_ascii_lowercase(),
			port,
		}
	}

	/// Does this rule allow a connection to `host:port`?
	pub fn matches(&self, host: &str, port: u16) -> bool {
		if let Some(rule_port) = self.port {
			if rule_port != port {
				return false;
			}
		}

		// Accept bracketed IPv6 hosts the way connect callers pass them.
		let host = host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.to_ascii_lowercase();
		if host.is_empty() {
			return false;
		}

		match self.host_pattern.as_str() {
			"*" => true,
			"localhost" => matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1"),
			pattern => {
				if let Some(suffix) = pattern.strip_prefix("*.") {
					host.len() > suffix.len() + 1 && host.ends_with(suffix)
						&& host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
				} else {
					host == pattern
				}
			}
		}
	}
}

impl std::fmt::Display for NetworkRule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.port {
			Some(port) if self.host_pattern.contains(':') => {
				write!(f, "[{}]:{}", self.host_pattern, port)
			}
			Some(port) => write!(f, "{}:{}", self.host_pattern, port),
			None => f.write_str(&self.host_pattern),
		}
	}
}

/// Parse one rule string.
///
/// Empty or unparseable input is an [`SandboxError::InvalidRule`]; the
/// caller is expected to skip the rule and log a warning.
pub fn parse_network_rule(raw: &str) -> SandboxResult<NetworkRule> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(invalid(raw, "empty rule"));
	}

	// Full URL form.
	if trimmed.contains("://") {
		let parsed =
			url::Url::parse(trimmed).map_err(|e| invalid(raw, &format!("URL parse: {e}")))?;
		let host = parsed
			.host_str()
			.ok_or_else(|| invalid(raw, "URL has no host"))?;
		// Strip the brackets url keeps around IPv6 hosts.
		let host = host.trim_start_matches('[').trim_end_matches(']');
		return Ok(NetworkRule::new(host, parsed.port_or_known_default()));
	}

	// Bracketed IPv6 with optional port.
	if let Some(rest) = trimmed.strip_prefix('[') {
		let (host, tail) = rest
			.split_once(']')
			.ok_or_else(|| invalid(raw, "unterminated IPv6 bracket"))?;
		if host.is_empty() {
			return Err(invalid(raw, "empty IPv6 host"));
		}

		let port = match tail {
			"" => None,
			tail => {
				let digits = tail
					.strip_prefix(':')
					.ok_or_else(|| invalid(raw, "expected ':' after IPv6 bracket"))?;
				Some(parse_port(raw, digits)?)
			}
		};
		return Ok(NetworkRule::new(host, port));
	}

	// host:port, unless the colon belongs to an unbracketed IPv6 literal.
	if let Some((host, port)) = trimmed.rsplit_once(':') {
		if !host.contains(':') {
			if host.is_empty() {
				return Err(invalid(raw, "empty host"));
			}
			return Ok(NetworkRule::new(host, Some(parse_port(raw, port)?)));
		}
	}

	Ok(NetworkRule::new(trimmed, None))
}

fn parse_port(raw: &str, digits: &str) -> SandboxResult<u16> {
	digits
		.parse::<u16>()
		.map_err(|_| invalid(raw, &format!("invalid port {digits:?}")))
}

fn invalid(rule: &str, reason: &str) -> SandboxError {
	SandboxError::InvalidRule {
		rule: rule.to_string(),
		reason: reason.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bare_host() {
		let rule = parse_network_rule("api.example.com").unwrap();
		assert_eq!(rule.host_pattern, "api.example.com");
		assert_eq!(rule.port, None);
	}

	#[test]
	fn parses_host_and_port() {
		let rule = parse_network_rule("example.com:443").unwrap();
		assert_eq!(rule.host_pattern, "example.com");
		assert_eq!(rule.port, Some(443));
	}

	#[test]
	fn parses_bracketed_ipv6_with_port() {
		let rule = parse_network_rule("[::1]:9000").unwrap();
		assert_eq!(rule.host_pattern, "::1");
		assert_eq!(rule.port, Some(9000));
	}

	#[test]
	fn parses_bracketed_ipv6_without_port() {
		let rule = parse_network_rule("[2001:db8::1]").unwrap();
		assert_eq!(rule.host_pattern, "2001:db8::1");
		assert_eq!(rule.port, None);
	}

	#[test]
	fn bare_ipv6_literal_is_a_host_without_port() {
		let rule = parse_network_rule("::1").unwrap();
		assert_eq!(rule.host_pattern, "::1");
		assert_eq!(rule.port, None);
	}

	#[test]
	fn parses_full_url_with_explicit_port() {
		let rule = parse_network_rule("https://example.com:8443/path").unwrap();
		assert_eq!(rule.host_pattern, "example.com");
		assert_eq!(rule.port, Some(8443));
	}

	#[test]
	fn url_scheme_implies_the_port() {
		let rule = parse_network_rule("https://example.com/v1/models").unwrap();
		assert_eq!(rule.host_pattern, "example.com");
		assert_eq!(rule.port, Some(443));
	}

	#[test]
	fn parses_wildcard_with_port() {
		let rule = parse_network_rule("*.internal.example:8080").unwrap();
		assert_eq!(rule.host_pattern, "*.internal.example");
		assert_eq!(rule.port, Some(8080));
	}

	#[test]
	fn rejects_empty_and_garbage_input() {
		assert!(parse_network_rule("").is_err());
		assert!(parse_network_rule("   ").is_err());
		assert!(parse_network_rule("example.com:notaport").is_err());
		assert!(parse_network_rule("[::1").is_err());
		assert!(parse_network_rule(":443").is_err());
	}

	#[test]
	fn exact_match_requires_equal_host() {
		let rule = NetworkRule::new("api.example.com", None);
		assert!(rule.matches("api.example.com", 443));
		assert!(rule.matches("API.EXAMPLE.COM", 80));
		assert!(!rule.matches("example.com", 443));
		assert!(!rule.matches("api.example.com.evil", 443));
	}

	#[test]
	fn port_match_is_exact_when_specified() {
		let rule = NetworkRule::new("example.com", Some(443));
		assert!(rule.matches("example.com", 443));
		assert!(!rule.matches("example.com", 8443));
	}

	#[test]
	fn wildcard_matches_subdomains_only() {
		let rule = NetworkRule::new("*.example.com", None);
		assert!(rule.matches("api.example.com", 443));
		assert!(rule.matches("a.b.example.com", 443));
		assert!(!rule.matches("example.com", 443));
		assert!(!rule.matches("notexample.com", 443));
	}

	#[test]
	fn star_matches_any_host() {
		let rule = NetworkRule::new("*", None);
		assert!(rule.matches("anything.example", 1));
		assert!(rule.matches("127.0.0.1", 65535));
	}

	#[test]
	fn localhost_alias_class() {
		let rule = NetworkRule::new("localhost", Some(8188));
		assert!(rule.matches("localhost", 8188));
		assert!(rule.matches("127.0.0.1", 8188));
		assert!(rule.matches("::1", 8188));
		assert!(rule.matches("[::1]", 8188));
		assert!(!rule.matches("localhost", 9000));
		assert!(!rule.matches("10.0.0.1", 8188));
	}

	#[test]
	fn ipv6_rule_matches_bare_and_bracketed_hosts() {
		let rule = parse_network_rule("[::1]:9000").unwrap();
		assert!(rule.matches("::1", 9000));
		assert!(rule.matches("[::1]", 9000));
		assert!(!rule.matches("::1", 9001));
	}

	#[test]
	fn display_roundtrips_through_parse() {
		for raw in ["api.example.com", "example.com:443", "[::1]:9000", "*.internal.example"] {
			let rule = parse_network_rule(raw).unwrap();
			let reparsed = parse_network_rule(&rule.to_string()).unwrap();
			assert_eq!(rule, reparsed);
		}
	}
}
