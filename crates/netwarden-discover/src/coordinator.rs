//! Sweep orchestration: expand → probe → identify → upsert → finalize.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use netwarden_core::types::{Device, ScanRecord};
use netwarden_store::Store;

use crate::error::{DiscoverError, Result};
use crate::probe::HostProbe;
use crate::range::AddressRange;
use crate::registry::{DeviceRegistry, ObservedDevice};
use crate::resolve::Identify;

/// Result of one sweep: the finalized record plus the devices found alive,
/// in no particular order (aggregation is a set union, not a sequence).
pub struct SweepOutcome {
    pub record: ScanRecord,
    pub devices: Vec<Device>,
}

/// Orchestrates sweeps over an address range with bounded concurrency.
pub struct ScanCoordinator {
    probe: Arc<dyn HostProbe>,
    resolver: Arc<dyn Identify>,
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn Store>,
    worker_limit: usize,
}

impl ScanCoordinator {
    pub fn new(
        probe: Arc<dyn HostProbe>,
        resolver: Arc<dyn Identify>,
        registry: Arc<DeviceRegistry>,
        store: Arc<dyn Store>,
        worker_limit: usize,
    ) -> Self {
        Self {
            probe,
            resolver,
            registry,
            store,
            worker_limit: worker_limit.max(1),
        }
    }

    /// Run one sweep.
    ///
    /// The in-progress record is persisted before any probing so status is
    /// externally observable mid-sweep. Range validation failures and
    /// probe-infrastructure failures finalize the record as failed and
    /// return it; `Err` is reserved for the store itself becoming
    /// unusable. Individual host timeouts are not sweep failures.
    pub async fn run_scan(&self, start_ip: &str, end_ip: &str) -> Result<SweepOutcome> {
        let record = ScanRecord::begin(start_ip, end_ip, Utc::now());
        self.store.save_scan_record(&record)?;

        tracing::info!(
            scan_id = %record.id,
            start_ip = %start_ip,
            end_ip = %end_ip,
            "Sweep started"
        );

        let range = match AddressRange::expand(start_ip, end_ip) {
            Ok(range) => range,
            Err(e) => {
                let record = record.fail(e.to_string(), Utc::now());
                self.store.save_scan_record(&record)?;
                tracing::warn!(scan_id = %record.id, error = %e, "Sweep rejected");
                return Ok(SweepOutcome {
                    record,
                    devices: Vec::new(),
                });
            }
        };

        match self.sweep(range).await {
            Ok(devices) => {
                let record = record.complete(devices.len() as u32, Utc::now());
                self.store.save_scan_record(&record)?;
                tracing::info!(
                    scan_id = %record.id,
                    addresses = range.len(),
                    devices_found = devices.len(),
                    "Sweep complete"
                );
                Ok(SweepOutcome { record, devices })
            }
            Err(e) => {
                let record = record.fail(e.to_string(), Utc::now());
                self.store.save_scan_record(&record)?;
                tracing::error!(scan_id = %record.id, error = %e, "Sweep aborted");
                Ok(SweepOutcome {
                    record,
                    devices: Vec::new(),
                })
            }
        }
    }

    /// Probe every address with at most `worker_limit` probes in flight.
    /// The first infrastructure error aborts the sweep; per-host
    /// unreachability just yields no device.
    async fn sweep(&self, range: AddressRange) -> Result<Vec<Device>> {
        stream::iter(range.iter())
            .map(|ip| async move {
                let outcome = self.probe.probe(ip).await?;
                if !outcome.alive {
                    return Ok::<Option<Device>, DiscoverError>(None);
                }

                let identity = self.resolver.resolve(ip, outcome.mac.as_deref()).await;
                let observed = ObservedDevice {
                    ip: ip.to_string(),
                    mac: outcome.mac,
                    name: identity.name,
                    manufacturer: identity.manufacturer,
                    device_type: identity.device_type,
                };
                let device = self.registry.upsert(observed, Utc::now()).await?;
                Ok(Some(device))
            })
            .buffer_unordered(self.worker_limit)
            .try_fold(Vec::new(), |mut found, device| async move {
                if let Some(device) = device {
                    found.push(device);
                }
                Ok(found)
            })
            .await
    }

    /// Retrieve one scan record (reconciliation-on-read applies).
    pub fn scan_status(&self, id: Uuid) -> Result<ScanRecord> {
        Ok(self.store.get_scan_record(id)?)
    }

    /// Recent scan records, newest first.
    pub fn scan_history(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        Ok(self.store.load_scan_history(limit)?)
    }
}
