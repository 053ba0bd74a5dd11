//! Host and pod address resolution.
//!
//! Each address is resolved through a priority chain: an explicit override from
//! the environment, then local interface inspection, then (host only) a
//! default-route probe. Every failure degrades to the next strategy and finally
//! to the `"unknown"` sentinel, so resolution never fails a request.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::config::{IdentityConfig, ROUTE_PROBE_TARGET, ROUTE_PROBE_TIMEOUT, UNKNOWN_IP};

/// Failure of one resolution step. Logged and degraded, never returned to clients.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("failed to enumerate interfaces: {0}")]
    Enumerate(String),

    #[error("interface '{0}' not found")]
    NotFound(String),

    #[error("route probe failed: {0}")]
    Probe(#[from] std::io::Error),

    #[error("route probe timed out after {0:?}")]
    ProbeTimeout(Duration),
}

/// One local interface and its addresses in the order the OS reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddrs {
    pub name: String,
    pub addrs: Vec<IpAddr>,
}

/// Source of local interface information.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError>;
}

/// Reads interfaces from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError> {
        let ifaces =
            NetworkInterface::show().map_err(|e| InterfaceError::Enumerate(e.to_string()))?;

        Ok(ifaces
            .into_iter()
            .map(|iface| InterfaceAddrs {
                addrs: iface.addr.iter().map(|a| a.ip()).collect(),
                name: iface.name,
            })
            .collect())
    }
}

/// Resolves the host and pod addresses reported by `/api/system`.
#[derive(Clone)]
pub struct IdentityResolver {
    config: IdentityConfig,
    source: Arc<dyn InterfaceSource>,
    probe_target: String,
    probe_timeout: Duration,
}

impl IdentityResolver {
    /// Resolver backed by the real system interfaces and default route.
    pub fn new(config: IdentityConfig) -> Self {
        Self::with_source(config, Arc::new(SystemInterfaces))
    }

    pub fn with_source(config: IdentityConfig, source: Arc<dyn InterfaceSource>) -> Self {
        Self {
            config,
            source,
            probe_target: ROUTE_PROBE_TARGET.to_string(),
            probe_timeout: ROUTE_PROBE_TIMEOUT,
        }
    }

    /// Override the address used for the default-route probe.
    pub fn with_probe_target(mut self, target: impl Into<String>, timeout: Duration) -> Self {
        self.probe_target = target.into();
        self.probe_timeout = timeout;
        self
    }

    /// Host address: `HOST_IP`, then the configured interface, then the
    /// default-route probe, then `"unknown"`.
    pub async fn resolve_host_ip(&self) -> String {
        if let Some(ip) = &self.config.host_ip_override {
            return ip.clone();
        }

        if let Some(name) = &self.config.host_interface {
            match self.interface_ipv4(name).await {
                Ok(Some(ip)) => return ip.to_string(),
                Ok(None) => {
                    debug!(interface = %name, "No IPv4 address on host interface, probing default route")
                }
                Err(e) => {
                    debug!(interface = %name, error = %e, "Host interface lookup failed, probing default route")
                }
            }
        }

        match self.probe_default_route().await {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                debug!(probe_target = %self.probe_target, error = %e, "Default route probe failed");
                UNKNOWN_IP.to_string()
            }
        }
    }

    /// Pod address: `POD_IP`, then the first usable address across all
    /// interfaces, then `"unknown"`.
    pub async fn resolve_pod_ip(&self) -> String {
        if let Some(ip) = &self.config.pod_ip_override {
            return ip.clone();
        }

        match self.list_interfaces().await {
            Ok(ifaces) => first_ipv4(ifaces.iter().flat_map(|iface| iface.addrs.iter()))
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNKNOWN_IP.to_string()),
            Err(e) => {
                debug!(error = %e, "Interface enumeration failed");
                UNKNOWN_IP.to_string()
            }
        }
    }

    async fn interface_ipv4(&self, name: &str) -> Result<Option<Ipv4Addr>, InterfaceError> {
        let ifaces = self.list_interfaces().await?;

        // Some platforms report one entry per address, so merge by name.
        let mut matching = ifaces.iter().filter(|iface| iface.name == name).peekable();
        if matching.peek().is_none() {
            return Err(InterfaceError::NotFound(name.to_string()));
        }

        Ok(first_ipv4(matching.flat_map(|iface| iface.addrs.iter())))
    }

    /// Enumeration is a blocking syscall (getifaddrs), so it runs on the
    /// blocking pool instead of a runtime worker.
    async fn list_interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.interfaces())
            .await
            .map_err(|e| InterfaceError::Enumerate(e.to_string()))?
    }

    /// Connect (without sending) a UDP socket so the OS picks the outbound
    /// interface, then read back the chosen local address.
    async fn probe_default_route(&self) -> Result<IpAddr, InterfaceError> {
        let probe = async {
            let socket = UdpSocket::bind("0.0.0.0:0").await?;
            socket.connect(self.probe_target.as_str()).await?;
            Ok::<_, std::io::Error>(socket.local_addr()?.ip())
        };

        tokio::time::timeout(self.probe_timeout, probe)
            .await
            .map_err(|_| InterfaceError::ProbeTimeout(self.probe_timeout))?
            .map_err(InterfaceError::from)
    }
}

/// First IPv4 (or IPv4-mapped) address that is not loopback.
fn first_ipv4<'a>(addrs: impl IntoIterator<Item = &'a IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| {
        let v4 = match addr {
            IpAddr::V4(v4) => *v4,
            IpAddr::V6(v6) => v6.to_ipv4_mapped()?,
        };
        (!v4.is_loopback()).then_some(v4)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    struct FixedInterfaces(Vec<InterfaceAddrs>);

    impl InterfaceSource for FixedInterfaces {
        fn interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenInterfaces;

    impl InterfaceSource for BrokenInterfaces {
        fn interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError> {
            Err(InterfaceError::Enumerate("permission denied".to_string()))
        }
    }

    fn iface(name: &str, addrs: &[&str]) -> InterfaceAddrs {
        InterfaceAddrs {
            name: name.to_string(),
            addrs: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    fn typical_interfaces() -> Arc<dyn InterfaceSource> {
        Arc::new(FixedInterfaces(vec![
            iface("lo", &["127.0.0.1", "::1"]),
            iface("eth0", &["fe80::1", "10.244.1.7", "10.244.1.8"]),
            iface("ens5", &["192.168.10.4"]),
        ]))
    }

    /// Loopback probe target always routes, so the result is deterministic.
    fn resolver(config: IdentityConfig, source: Arc<dyn InterfaceSource>) -> IdentityResolver {
        IdentityResolver::with_source(config, source)
            .with_probe_target("127.0.0.1:9", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_host_override_bypasses_everything() {
        let config = IdentityConfig {
            host_interface: Some("eth0".to_string()),
            host_ip_override: Some("203.0.113.5".to_string()),
            pod_ip_override: None,
        };
        let resolver = IdentityResolver::with_source(config, Arc::new(BrokenInterfaces))
            .with_probe_target("[::1]:80", Duration::from_millis(10));

        assert_eq!(resolver.resolve_host_ip().await, "203.0.113.5");
    }

    #[tokio::test]
    async fn test_host_from_named_interface() {
        let config = IdentityConfig {
            host_interface: Some("eth0".to_string()),
            ..Default::default()
        };
        let resolver = resolver(config, typical_interfaces());

        assert_eq!(resolver.resolve_host_ip().await, "10.244.1.7");
    }

    #[tokio::test]
    async fn test_host_named_interface_split_across_entries() {
        let source = Arc::new(FixedInterfaces(vec![
            iface("eth0", &["fe80::1"]),
            iface("eth1", &["10.0.0.2"]),
            iface("eth0", &["172.31.4.9"]),
        ]));
        let config = IdentityConfig {
            host_interface: Some("eth0".to_string()),
            ..Default::default()
        };

        assert_eq!(resolver(config, source).resolve_host_ip().await, "172.31.4.9");
    }

    #[tokio::test]
    async fn test_host_missing_interface_falls_back_to_probe() {
        let config = IdentityConfig {
            host_interface: Some("wlan9".to_string()),
            ..Default::default()
        };
        let resolver = resolver(config, typical_interfaces());

        assert_eq!(resolver.resolve_host_ip().await, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_host_probe_returns_ipv4_without_interface() {
        let resolver = resolver(IdentityConfig::default(), Arc::new(BrokenInterfaces));

        let host = resolver.resolve_host_ip().await;
        assert!(host.parse::<Ipv4Addr>().is_ok(), "not an IPv4 address: {host}");
    }

    #[tokio::test]
    async fn test_host_unknown_when_all_strategies_fail() {
        let config = IdentityConfig {
            host_interface: Some("eth0".to_string()),
            ..Default::default()
        };
        // An IPv6 target cannot be reached from the IPv4 probe socket.
        let resolver = IdentityResolver::with_source(config, Arc::new(BrokenInterfaces))
            .with_probe_target("[::1]:80", Duration::from_secs(1));

        assert_eq!(resolver.resolve_host_ip().await, UNKNOWN_IP);
    }

    #[tokio::test]
    async fn test_pod_override() {
        let config = IdentityConfig {
            pod_ip_override: Some("10.1.2.3".to_string()),
            ..Default::default()
        };
        let resolver = resolver(config, Arc::new(BrokenInterfaces));

        assert_eq!(resolver.resolve_pod_ip().await, "10.1.2.3");
    }

    #[tokio::test]
    async fn test_pod_first_non_loopback_ipv4() {
        let resolver = resolver(IdentityConfig::default(), typical_interfaces());
        assert_eq!(resolver.resolve_pod_ip().await, "10.244.1.7");
    }

    #[tokio::test]
    async fn test_pod_unknown_without_usable_address() {
        let source = Arc::new(FixedInterfaces(vec![
            iface("lo", &["127.0.0.1", "::1"]),
            iface("eth0", &["fe80::1", "2001:db8::7"]),
        ]));
        let resolver = resolver(IdentityConfig::default(), source);

        assert_eq!(resolver.resolve_pod_ip().await, "unknown");
    }

    #[tokio::test]
    async fn test_pod_unknown_when_enumeration_fails() {
        let resolver = resolver(IdentityConfig::default(), Arc::new(BrokenInterfaces));
        assert_eq!(resolver.resolve_pod_ip().await, "unknown");
    }

    /// Records the thread each enumeration ran on.
    struct ThreadRecordingInterfaces(std::sync::Mutex<Vec<std::thread::ThreadId>>);

    impl InterfaceSource for ThreadRecordingInterfaces {
        fn interfaces(&self) -> Result<Vec<InterfaceAddrs>, InterfaceError> {
            self.0.lock().unwrap().push(std::thread::current().id());
            Ok(vec![iface("eth0", &["10.244.1.7"])])
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_enumeration_runs_off_the_runtime_thread() {
        let source = Arc::new(ThreadRecordingInterfaces(Default::default()));
        let config = IdentityConfig {
            host_interface: Some("eth0".to_string()),
            ..Default::default()
        };
        let resolver = resolver(config, source.clone());

        assert_eq!(resolver.resolve_pod_ip().await, "10.244.1.7");
        assert_eq!(resolver.resolve_host_ip().await, "10.244.1.7");

        let runtime_thread = std::thread::current().id();
        let seen = source.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_first_ipv4_accepts_mapped_addresses() {
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 5).to_ipv6_mapped());
        let mapped_loopback = IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped());
        let addrs = [IpAddr::V6(Ipv6Addr::LOCALHOST), mapped_loopback, mapped];

        assert_eq!(first_ipv4(&addrs), Some(Ipv4Addr::new(10, 0, 0, 5)));
    }
}
