//! Network operations: plain fetches and anonymizing-proxy checks.

use famulus_types::OpOutcome;
use serde_json::json;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Longest response body preview carried in an envelope.
const BODY_PREVIEW_LIMIT: usize = 2048;

pub struct NetOps {
    agent: ureq::Agent,
}

impl Default for NetOps {
    fn default() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(15))
                .build(),
        }
    }
}

impl NetOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain GET with a capped body preview.
    pub fn http_get(&self, url: &str) -> OpOutcome {
        debug!(target: "famulus::ops", op = "http_get", url);
        match self.agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                let preview: String = body.chars().take(BODY_PREVIEW_LIMIT).collect();
                OpOutcome::ok_with(
                    format!("GET {url} returned {status} ({} bytes)", body.len()),
                    json!({"status": status, "body": preview}),
                )
            }
            Err(ureq::Error::Status(code, _)) => {
                OpOutcome::fail(format!("GET {url} returned status {code}"))
            }
            Err(e) => OpOutcome::fail(format!("Error fetching {url}: {e}")),
        }
    }

    /// TCP reachability check against a local proxy port.
    pub fn probe_proxy(&self, host: &str, port: u16, timeout: Duration) -> OpOutcome {
        let addr = match (host, port).to_socket_addrs().map(|mut a| a.next()) {
            Ok(Some(addr)) => addr,
            _ => return OpOutcome::fail(format!("Cannot resolve proxy address {host}:{port}")),
        };
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => OpOutcome::ok(format!("Proxy reachable at {host}:{port}")),
            Err(e) => OpOutcome::fail(format!("Proxy not reachable at {host}:{port}: {e}")),
        }
    }

    /// Fetch a URL through a local SOCKS5 proxy. The proxy is probed first
    /// so a dead proxy reports distinctly from a dead remote.
    pub fn fetch_via_proxy(&self, url: &str, proxy_host: &str, proxy_port: u16) -> OpOutcome {
        let probe = self.probe_proxy(proxy_host, proxy_port, Duration::from_secs(2));
        if !probe.success {
            return probe;
        }

        let proxy = match ureq::Proxy::new(format!("socks5://{proxy_host}:{proxy_port}")) {
            Ok(proxy) => proxy,
            Err(e) => return OpOutcome::fail(format!("Invalid proxy configuration: {e}")),
        };
        let agent = ureq::AgentBuilder::new()
            .proxy(proxy)
            .timeout(Duration::from_secs(30))
            .build();

        debug!(target: "famulus::ops", op = "fetch_via_proxy", url, proxy_host, proxy_port);
        match agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                OpOutcome::ok(format!("Fetched {url} via proxy, status {status}"))
            }
            Err(e) => OpOutcome::fail(format!("Error fetching {url} via proxy: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_unreachable_proxy_fails() {
        // Port 1 is essentially never listening locally.
        let outcome = NetOps::new().probe_proxy("127.0.0.1", 1, Duration::from_millis(300));
        assert!(!outcome.success);
        assert!(outcome.message.contains("not reachable"));
    }

    #[test]
    fn test_fetch_via_dead_proxy_reports_proxy_failure() {
        let outcome = NetOps::new().fetch_via_proxy("http://example.invalid", "127.0.0.1", 1);
        assert!(!outcome.success);
        assert!(outcome.message.contains("Proxy not reachable"));
    }

    #[test]
    fn test_http_get_unreachable_host_fails_cleanly() {
        let outcome = NetOps::new().http_get("http://127.0.0.1:1/none");
        assert!(!outcome.success);
    }
}
