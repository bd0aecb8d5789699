use std::net::SocketAddr;

/// Parsed `host:port` bind endpoint for the HTTP/WebSocket surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpEndpoint {
	pub host: String,
	pub port: u16,
}

impl HttpEndpoint {
	/// Returns `host:port` (host preserved, IPv6 stays bracketed).
	pub fn hostport(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Convert to `SocketAddr` only if the host is an IP literal.
	pub fn to_socket_addr_if_ip_literal(&self) -> Result<SocketAddr, String> {
		self.hostport()
			.parse()
			.map_err(|_| format!("host must be an IP literal (DNS names not supported here): {}", self.host))
	}

	/// Parse a bind endpoint string in the form `host:port`.
	pub fn parse(s: &str) -> Result<Self, String> {
		let s = s.trim();
		if s.is_empty() {
			return Err("endpoint must be non-empty (expected host:port)".to_string());
		}

		if s.contains('/') || s.contains('?') || s.contains('#') {
			return Err(format!("invalid endpoint (expected host:port without path/query/fragment): {s}"));
		}

		let (host, port_str) = s
			.rsplit_once(':')
			.ok_or_else(|| format!("invalid endpoint (missing :port, expected host:port): {s}"))?;

		let host = host.trim();
		if host.is_empty() {
			return Err(format!("invalid endpoint host (expected host:port): {s}"));
		}

		if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
			return Err(format!("invalid endpoint host (IPv6 must be bracketed like [::1]:8080): {s}"));
		}

		let port: u16 = port_str
			.trim()
			.parse()
			.map_err(|_| format!("invalid endpoint port (expected 1..=65535): {s}"))?;

		if port == 0 {
			return Err(format!("invalid endpoint port (expected 1..=65535): {s}"));
		}

		Ok(Self {
			host: host.to_string(),
			port,
		})
	}
}

/// Validate a `host:port` endpoint string.
pub fn validate_endpoint(s: &str) -> Result<(), String> {
	let _ = HttpEndpoint::parse(s)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_dns_hostname() {
		let e = HttpEndpoint::parse("streaming.example.com:443").unwrap();
		assert_eq!(e.host, "streaming.example.com");
		assert_eq!(e.port, 443);
		assert_eq!(e.hostport(), "streaming.example.com:443");
	}

	#[test]
	fn parses_ipv4() {
		let e = HttpEndpoint::parse("127.0.0.1:8080").unwrap();
		assert_eq!(e.host, "127.0.0.1");
		assert_eq!(e.port, 8080);
		assert_eq!(e.hostport(), "127.0.0.1:8080");
	}

	#[test]
	fn parses_bracketed_ipv6() {
		let e = HttpEndpoint::parse("[::1]:8080").unwrap();
		assert_eq!(e.host, "[::1]");
		assert_eq!(e.port, 8080);
		assert_eq!(e.hostport(), "[::1]:8080");
	}

	#[test]
	fn rejects_unbracketed_ipv6() {
		let err = HttpEndpoint::parse("::1:8080").unwrap_err();
		assert!(err.to_lowercase().contains("ipv6"));
	}

	#[test]
	fn rejects_path_query_fragment() {
		assert!(HttpEndpoint::parse("127.0.0.1:8080/").is_err());
		assert!(HttpEndpoint::parse("127.0.0.1:8080?x=y").is_err());
		assert!(HttpEndpoint::parse("127.0.0.1:8080#frag").is_err());
	}

	#[test]
	fn rejects_port_zero_and_missing_port() {
		assert!(HttpEndpoint::parse("127.0.0.1:0").is_err());
		assert!(HttpEndpoint::parse("127.0.0.1").is_err());
	}

	#[test]
	fn to_socket_addr_if_ip_literal_accepts_ip_literals() {
		let e4 = HttpEndpoint::parse("127.0.0.1:8080").unwrap();
		let a4 = e4.to_socket_addr_if_ip_literal().unwrap();
		assert_eq!(a4.to_string(), "127.0.0.1:8080");

		let e6 = HttpEndpoint::parse("[::1]:8080").unwrap();
		let a6 = e6.to_socket_addr_if_ip_literal().unwrap();
		assert_eq!(a6.to_string(), "[::1]:8080");
	}

	#[test]
	fn to_socket_addr_if_ip_literal_rejects_dns() {
		let e = HttpEndpoint::parse("streaming.example.com:443").unwrap();
		assert!(e.to_socket_addr_if_ip_literal().is_err());
	}
}
