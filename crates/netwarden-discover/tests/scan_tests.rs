//! End-to-end sweep tests against scripted probe and resolver doubles.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use netwarden_core::types::{DeviceType, ScanStatus};
use netwarden_store::JsonStore;

use netwarden_discover::coordinator::ScanCoordinator;
use netwarden_discover::error::{DiscoverError, Result};
use netwarden_discover::probe::{HostProbe, ProbeOutcome};
use netwarden_discover::registry::DeviceRegistry;
use netwarden_discover::resolve::{Identification, Identify};

/// Probe double driven by a shared alive-map (IP → optional MAC).
struct ScriptedProbe {
    alive: Arc<Mutex<HashMap<Ipv4Addr, Option<String>>>>,
    probes: AtomicUsize,
}

impl ScriptedProbe {
    fn new(alive: &[(Ipv4Addr, Option<&str>)]) -> Self {
        let map = alive
            .iter()
            .map(|(ip, mac)| (*ip, mac.map(String::from)))
            .collect();
        Self {
            alive: Arc::new(Mutex::new(map)),
            probes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HostProbe for ScriptedProbe {
    async fn probe(&self, ip: Ipv4Addr) -> Result<ProbeOutcome> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let alive = self.alive.lock().unwrap();
        match alive.get(&ip) {
            Some(mac) => Ok(ProbeOutcome {
                alive: true,
                mac: mac.clone(),
            }),
            None => Ok(ProbeOutcome::default()),
        }
    }
}

/// Probe double that tracks the number of concurrently in-flight probes.
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl HostProbe for ConcurrencyProbe {
    async fn probe(&self, _ip: Ipv4Addr) -> Result<ProbeOutcome> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ProbeOutcome::default())
    }
}

/// Probe double whose underlying mechanism is broken.
struct BrokenProbe;

#[async_trait]
impl HostProbe for BrokenProbe {
    async fn probe(&self, _ip: Ipv4Addr) -> Result<ProbeOutcome> {
        Err(DiscoverError::ProbeInfrastructure(
            "ping: command not found".to_string(),
        ))
    }
}

/// Resolver fixture: constant identification, no network access.
struct FixtureIdentify {
    name: Option<String>,
    manufacturer: Option<String>,
    device_type: DeviceType,
}

impl FixtureIdentify {
    fn empty() -> Self {
        Self {
            name: None,
            manufacturer: None,
            device_type: DeviceType::Unknown,
        }
    }
}

#[async_trait]
impl Identify for FixtureIdentify {
    async fn resolve(&self, _ip: Ipv4Addr, _mac: Option<&str>) -> Identification {
        Identification {
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            open_ports: Vec::new(),
            device_type: self.device_type,
        }
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    registry: Arc<DeviceRegistry>,
    coordinator: ScanCoordinator,
}

fn harness(probe: Arc<dyn HostProbe>, resolver: Arc<dyn Identify>, workers: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonStore::open(dir.path()).unwrap());
    let registry = Arc::new(DeviceRegistry::load(store.clone()).unwrap());
    let coordinator = ScanCoordinator::new(probe, resolver, registry.clone(), store, workers);
    Harness {
        _dir: dir,
        registry,
        coordinator,
    }
}

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, last)
}

#[tokio::test]
async fn fresh_scan_records_live_hosts() {
    let probe = Arc::new(ScriptedProbe::new(&[
        (ip(1), Some("aa:bb:cc:dd:ee:01")),
        (ip(3), None),
    ]));
    let h = harness(probe.clone(), Arc::new(FixtureIdentify::empty()), 8);

    let outcome = h
        .coordinator
        .run_scan("192.168.1.1", "192.168.1.5")
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ScanStatus::Completed);
    assert_eq!(outcome.record.devices_found, 2);
    assert!(outcome.record.completed_at.is_some());
    assert_eq!(probe.probes.load(Ordering::SeqCst), 5);

    let devices = h.registry.list_all().await;
    assert_eq!(devices.len(), 2);
    for device in &devices {
        assert_eq!(device.first_seen, device.last_seen);
    }
    let with_mac = devices.iter().find(|d| d.ip == "192.168.1.1").unwrap();
    assert_eq!(with_mac.mac.as_deref(), Some("AA:BB:CC:DD:EE:01"));

    // The finalized record is readable through the status surface.
    let status = h.coordinator.scan_status(outcome.record.id).unwrap();
    assert_eq!(status.status, ScanStatus::Completed);
}

#[tokio::test]
async fn sweep_concurrency_never_exceeds_worker_limit() {
    let probe = Arc::new(ConcurrencyProbe {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let h = harness(probe.clone(), Arc::new(FixtureIdentify::empty()), 4);

    let outcome = h
        .coordinator
        .run_scan("10.0.0.1", "10.0.0.255")
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ScanStatus::Completed);
    assert!(
        probe.max_in_flight.load(Ordering::SeqCst) <= 4,
        "observed {} concurrent probes with a worker limit of 4",
        probe.max_in_flight.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn invalid_range_fails_before_probing() {
    let probe = Arc::new(ScriptedProbe::new(&[]));
    let h = harness(probe.clone(), Arc::new(FixtureIdentify::empty()), 8);

    let outcome = h
        .coordinator
        .run_scan("192.168.1.10", "192.168.2.10")
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ScanStatus::Failed);
    assert!(outcome.record.error.unwrap().contains("/24"));
    assert_eq!(probe.probes.load(Ordering::SeqCst), 0, "no probing expected");
}

#[tokio::test]
async fn infrastructure_failure_aborts_the_sweep() {
    let h = harness(Arc::new(BrokenProbe), Arc::new(FixtureIdentify::empty()), 8);

    let outcome = h
        .coordinator
        .run_scan("192.168.1.1", "192.168.1.5")
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ScanStatus::Failed);
    assert!(outcome
        .record
        .error
        .unwrap()
        .contains("ping: command not found"));
    assert!(h.registry.list_all().await.is_empty());
}

#[tokio::test]
async fn unreachable_hosts_are_not_failures() {
    // Nothing answers; the sweep still completes with zero devices.
    let h = harness(
        Arc::new(ScriptedProbe::new(&[])),
        Arc::new(FixtureIdentify::empty()),
        8,
    );

    let outcome = h
        .coordinator
        .run_scan("192.168.1.1", "192.168.1.10")
        .await
        .unwrap();

    assert_eq!(outcome.record.status, ScanStatus::Completed);
    assert_eq!(outcome.record.devices_found, 0);
}

#[tokio::test]
async fn repeat_scans_keep_device_identity() {
    let probe = Arc::new(ScriptedProbe::new(&[(ip(5), Some("aa:bb:cc:dd:ee:05"))]));
    let h = harness(probe.clone(), Arc::new(FixtureIdentify::empty()), 8);

    h.coordinator
        .run_scan("192.168.1.1", "192.168.1.10")
        .await
        .unwrap();
    let first = h.registry.find_by_ip("192.168.1.5").await.unwrap();

    // The host swaps its interface; same IP, new MAC.
    probe
        .alive
        .lock()
        .unwrap()
        .insert(ip(5), Some("11:22:33:44:55:66".to_string()));
    h.coordinator
        .run_scan("192.168.1.1", "192.168.1.10")
        .await
        .unwrap();

    let devices = h.registry.list_all().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, first.id);
    assert_eq!(devices[0].mac.as_deref(), Some("11:22:33:44:55:66"));
    assert_eq!(devices[0].first_seen, first.first_seen);
}

#[tokio::test]
async fn resolver_output_lands_on_the_device() {
    let probe = Arc::new(ScriptedProbe::new(&[(ip(1), Some("6c:c8:40:8c:a3:e0"))]));
    let resolver = Arc::new(FixtureIdentify {
        name: Some("gateway".to_string()),
        manufacturer: Some("TP-Link".to_string()),
        device_type: DeviceType::Router,
    });
    let h = harness(probe, resolver, 8);

    h.coordinator
        .run_scan("192.168.1.1", "192.168.1.3")
        .await
        .unwrap();

    let device = h.registry.find_by_ip("192.168.1.1").await.unwrap();
    assert_eq!(device.name.as_deref(), Some("gateway"));
    assert_eq!(device.manufacturer, "TP-Link");
    assert_eq!(device.device_type, DeviceType::Router);

    let history = h.coordinator.scan_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].devices_found, 1);
}
