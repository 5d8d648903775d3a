//! The authoritative device collection.
//!
//! The registry owns the in-memory device map and writes through to the
//! store on every mutation. All mutations take the single registry lock,
//! which serializes concurrent upserts from parallel probe-result handlers
//! so same-key writes cannot be lost.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use netwarden_core::types::{normalize_mac, Device, DeviceStatus, DeviceType};
use netwarden_store::{Store, StoreError};

use crate::error::Result;

/// What one sweep observed about a live host; input to [`DeviceRegistry::upsert`].
#[derive(Debug, Clone, Default)]
pub struct ObservedDevice {
    pub ip: String,
    pub mac: Option<String>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub device_type: DeviceType,
}

/// Caller-driven field update (user-assigned label or classification).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub device_type: Option<DeviceType>,
}

pub struct DeviceRegistry {
    store: Arc<dyn Store>,
    devices: Mutex<HashMap<Uuid, Device>>,
}

impl DeviceRegistry {
    /// Load the known device set from the store.
    pub fn load(store: Arc<dyn Store>) -> Result<Self> {
        let devices = store
            .get_all_devices()?
            .into_iter()
            .map(|d| (d.id, d))
            .collect::<HashMap<_, _>>();
        tracing::info!(device_count = devices.len(), "Device registry loaded");
        Ok(Self {
            store,
            devices: Mutex::new(devices),
        })
    }

    /// Insert-or-update from a sweep observation.
    ///
    /// Identity resolution: IP match first, then MAC. IP precedence means
    /// a lease reused by new hardware updates the existing record in place
    /// rather than forking a second device; MAC match with a new IP means
    /// the same device moved leases, so its `ip` is rewritten.
    /// `first_seen` is set once at creation and never altered.
    pub async fn upsert(&self, observed: ObservedDevice, now: DateTime<Utc>) -> Result<Device> {
        let mac = observed.mac.as_deref().and_then(normalize_mac);
        let mut devices = self.devices.lock().await;

        let existing_id = devices
            .values()
            .find(|d| d.ip == observed.ip)
            .or_else(|| {
                let mac = mac.as_deref()?;
                devices.values().find(|d| d.mac.as_deref() == Some(mac))
            })
            .map(|d| d.id);

        let device = match existing_id {
            Some(id) => {
                let device = devices.get_mut(&id).expect("id came from the map");
                device.ip = observed.ip;
                if mac.is_some() {
                    device.mac = mac;
                }
                if observed.name.is_some() {
                    device.name = observed.name;
                }
                if let Some(manufacturer) = observed.manufacturer {
                    device.manufacturer = manufacturer;
                }
                if observed.device_type != DeviceType::Unknown {
                    device.device_type = observed.device_type;
                }
                device.status = DeviceStatus::Online;
                device.last_seen = now;
                device.clone()
            }
            None => {
                let mut device = Device::new(observed.ip, now);
                device.mac = mac;
                device.name = observed.name;
                device.device_type = observed.device_type;
                if let Some(manufacturer) = observed.manufacturer {
                    device.manufacturer = manufacturer;
                }
                devices.insert(device.id, device.clone());
                device
            }
        };

        self.store.upsert_device(&device)?;
        Ok(device)
    }

    pub async fn find_by_ip(&self, ip: &str) -> Option<Device> {
        self.devices
            .lock()
            .await
            .values()
            .find(|d| d.ip == ip)
            .cloned()
    }

    pub async fn find_by_mac(&self, mac: &str) -> Option<Device> {
        let mac = normalize_mac(mac)?;
        self.devices
            .lock()
            .await
            .values()
            .find(|d| d.mac.as_deref() == Some(mac.as_str()))
            .cloned()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Device> {
        self.devices.lock().await.get(&id).cloned()
    }

    /// All devices ordered by `last_seen` descending.
    pub async fn list_all(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.lock().await.values().cloned().collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        devices
    }

    /// Remove a device. Historical scan records are left untouched.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut devices = self.devices.lock().await;
        if devices.remove(&id).is_none() {
            return Err(StoreError::DeviceNotFound(id).into());
        }
        self.store.delete_device(id)?;
        Ok(())
    }

    /// Apply a caller-supplied field update.
    pub async fn update_fields(&self, id: Uuid, update: DeviceUpdate) -> Result<Device> {
        let mut devices = self.devices.lock().await;
        let device = devices
            .get_mut(&id)
            .ok_or(StoreError::DeviceNotFound(id))?;

        if let Some(name) = update.name {
            device.name = Some(name);
        }
        if let Some(device_type) = update.device_type {
            device.device_type = device_type;
        }

        let device = device.clone();
        self.store.upsert_device(&device)?;
        Ok(device)
    }

    /// Staleness policy: flip devices to offline when they have not been
    /// seen since the cutoff. A single missed sweep never flips status;
    /// the scheduler passes a cutoff of two scan intervals.
    pub async fn mark_stale_offline(&self, cutoff: DateTime<Utc>) -> Result<Vec<Device>> {
        let mut devices = self.devices.lock().await;
        let mut flipped = Vec::new();

        for device in devices.values_mut() {
            if device.status == DeviceStatus::Online && device.last_seen < cutoff {
                device.status = DeviceStatus::Offline;
                self.store.upsert_device(device)?;
                flipped.push(device.clone());
            }
        }

        if !flipped.is_empty() {
            tracing::info!(count = flipped.len(), "Marked stale devices offline");
        }
        Ok(flipped)
    }
}
