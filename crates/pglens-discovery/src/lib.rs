//! Network discovery of PostgreSQL instances
//!
//! Probes a /24 subnet (or an explicit host list) over a port range with
//! plain TCP connects. Concurrency is capped by a semaphore so a scan can
//! never exhaust OS socket resources; the cap is a resource-protection
//! invariant, not a tuning knob.

use futures::future::join_all;
use std::net::UdpSocket;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Hard ceiling on simultaneous probes.
pub const MAX_CONCURRENT_PROBES: usize = 20;

/// Per-probe TCP connect timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// A host:port that accepted a TCP connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredInstance {
    pub host: String,
    pub port: u16,
    /// Connect latency in milliseconds
    pub response_time_ms: f64,
}

/// Bounded-concurrency prober.
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_PROBES, PROBE_TIMEOUT)
    }
}

impl DiscoveryEngine {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            timeout,
        }
    }

    /// Base /24 of the local network interface, e.g. `192.168.1`.
    ///
    /// Determined by opening a UDP socket toward a public address (no packet
    /// is sent) and reading the chosen local address. Falls back to
    /// `192.168.1` when detection fails.
    pub fn local_subnet() -> String {
        fn detect() -> std::io::Result<String> {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.connect("8.8.8.8:80")?;
            let local = socket.local_addr()?;
            let ip = local.ip().to_string();
            let mut octets: Vec<&str> = ip.split('.').collect();
            octets.truncate(3);
            Ok(octets.join("."))
        }

        match detect() {
            Ok(subnet) => subnet,
            Err(e) => {
                tracing::warn!("Subnet detection failed ({}), falling back to 192.168.1", e);
                "192.168.1".to_string()
            }
        }
    }

    /// Probe one host:port. Returns None when unreachable or timed out.
    pub async fn probe(&self, host: &str, port: u16) -> Option<DiscoveredInstance> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        let start = Instant::now();
        match timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Some(DiscoveredInstance {
                host: host.to_string(),
                port,
                response_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            }),
            _ => None,
        }
    }

    /// Scan hosts .1 through .254 of a /24 subnet across a port range.
    pub async fn scan_subnet(
        &self,
        base_ip: &str,
        ports: Range<u16>,
    ) -> Vec<DiscoveredInstance> {
        let hosts: Vec<String> = (1..255).map(|octet| format!("{}.{}", base_ip, octet)).collect();
        self.scan_hosts(&hosts, ports).await
    }

    /// Scan an explicit host list across a port range.
    pub async fn scan_hosts(
        &self,
        hosts: &[String],
        ports: Range<u16>,
    ) -> Vec<DiscoveredInstance> {
        let mut probes = Vec::new();
        for host in hosts {
            for port in ports.clone() {
                probes.push(self.probe(host, port));
            }
        }

        // The semaphore, not this join, bounds actual concurrency.
        join_all(probes)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
