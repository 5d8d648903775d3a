//! Host identification: name, manufacturer, and responsive service ports.
//!
//! The three resolution phases are independent and run concurrently for a
//! single host, so resolution latency is the max of the three rather than
//! the sum. Every phase degrades to an absent value on failure; resolution
//! itself never fails a sweep.

pub mod name;
pub mod ports;
pub mod vendor;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use netwarden_core::types::{DeviceType, PortService};

use crate::config::DiscoverConfig;
use vendor::{vendor_prefix, VendorLookup};

/// What resolution learned about one live host.
#[derive(Debug, Clone, Default)]
pub struct Identification {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub open_ports: Vec<PortService>,
    pub device_type: DeviceType,
}

/// Identification boundary, injected so sweeps can run against fixtures.
#[async_trait]
pub trait Identify: Send + Sync {
    async fn resolve(&self, ip: Ipv4Addr, mac: Option<&str>) -> Identification;
}

/// Production resolver: reverse DNS / NetBIOS / mDNS for names, a cached
/// external lookup for vendors, TCP connect probes for ports.
pub struct IdentificationResolver {
    vendors: Arc<dyn VendorLookup>,
    /// Vendor prefix → vendor name. Negative results are cached too, to
    /// bound repeat-lookup cost; vendor assignments are effectively
    /// permanent so there is no expiry.
    vendor_cache: Mutex<HashMap<String, Option<String>>>,
    name_timeout: Duration,
    port_timeout: Duration,
    port_budget: Duration,
}

impl IdentificationResolver {
    pub fn new(vendors: Arc<dyn VendorLookup>, config: &DiscoverConfig) -> Self {
        Self {
            vendors,
            vendor_cache: Mutex::new(HashMap::new()),
            name_timeout: Duration::from_millis(config.name_timeout_ms),
            port_timeout: Duration::from_millis(config.port_timeout_ms),
            port_budget: Duration::from_millis(config.port_budget_ms),
        }
    }

    async fn manufacturer_for(&self, mac: Option<&str>) -> Option<String> {
        let prefix = vendor_prefix(mac?)?;

        if let Some(cached) = self.vendor_cache.lock().await.get(&prefix) {
            return cached.clone();
        }

        let resolved = self.vendors.vendor(&prefix).await;
        self.vendor_cache
            .lock()
            .await
            .insert(prefix.clone(), resolved.clone());

        if resolved.is_none() {
            tracing::debug!(prefix = %prefix, "Vendor prefix unresolved, caching negative result");
        }
        resolved
    }
}

#[async_trait]
impl Identify for IdentificationResolver {
    async fn resolve(&self, ip: Ipv4Addr, mac: Option<&str>) -> Identification {
        let (name, manufacturer, open_ports) = tokio::join!(
            name::resolve_name(ip, self.name_timeout),
            self.manufacturer_for(mac),
            ports::scan_well_known(ip, self.port_timeout, self.port_budget),
        );

        let device_type = ports::classify(&open_ports);

        tracing::debug!(
            ip = %ip,
            name = ?name,
            manufacturer = ?manufacturer,
            open_ports = open_ports.len(),
            device_type = ?device_type,
            "Host identified"
        );

        Identification {
            name,
            manufacturer,
            open_ports,
            device_type,
        }
    }
}
