//! Store trait + JSON-file-backed implementation.
//!
//! Scan records and devices are stored as one JSON file per record under
//! the store root; the auto-scan configuration is a single `config.json`
//! written atomically (temp file + rename) so a crash never leaves a
//! partially-written configuration visible.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use netwarden_core::types::{AutoScanConfig, Device, ScanRecord, ScanStatus};

/// Errors from persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scan record not found: {0}")]
    ScanNotFound(Uuid),

    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),

    #[error("Store root is not usable: {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence collaborator consumed by the discovery engine.
pub trait Store: Send + Sync {
    /// Persist a scan record, overwriting any prior state for the same ID.
    fn save_scan_record(&self, record: &ScanRecord) -> Result<()>;

    /// Retrieve one scan record, applying the reconciliation-on-read rule.
    fn get_scan_record(&self, id: Uuid) -> Result<ScanRecord>;

    /// List scan records ordered by `started_at` descending, up to `limit`.
    fn load_scan_history(&self, limit: usize) -> Result<Vec<ScanRecord>>;

    /// Persist a device, overwriting any prior state for the same ID.
    fn upsert_device(&self, device: &Device) -> Result<()>;

    fn get_all_devices(&self) -> Result<Vec<Device>>;

    /// Remove a device. Does not cascade to historical scan records.
    fn delete_device(&self, id: Uuid) -> Result<()>;

    /// Persist the auto-scan configuration atomically.
    fn save_auto_scan_config(&self, config: &AutoScanConfig) -> Result<()>;

    /// Load the auto-scan configuration; `None` before the first save.
    fn load_auto_scan_config(&self) -> Result<Option<AutoScanConfig>>;
}

/// File-system backed store.
///
/// ```text
/// {root}/
///   scans/{scan_id}.json
///   devices/{device_id}.json
///   config.json
/// ```
pub struct JsonStore {
    root: PathBuf,
    /// An `in_progress` record older than this is surfaced as failed by
    /// readers. A crash between the in-progress write and the terminal
    /// write would otherwise leave the record in-progress forever.
    in_progress_stale_after: TimeDelta,
}

const DEFAULT_STALE_MINUTES: i64 = 10;

impl JsonStore {
    /// Open a store rooted at the given directory, creating it if absent.
    /// Fails fast when the root cannot be created or written.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [root.clone(), root.join("scans"), root.join("devices")] {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Open {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(Self {
            root,
            in_progress_stale_after: TimeDelta::minutes(DEFAULT_STALE_MINUTES),
        })
    }

    pub fn with_stale_bound(mut self, bound: TimeDelta) -> Self {
        self.in_progress_stale_after = bound;
        self
    }

    fn scan_path(&self, id: Uuid) -> PathBuf {
        self.root.join("scans").join(format!("{id}.json"))
    }

    fn device_path(&self, id: Uuid) -> PathBuf {
        self.root.join("devices").join(format!("{id}.json"))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Reconciliation-on-read: an `in_progress` record past the staleness
    /// bound is reported as failed. The file itself is left untouched, so
    /// the rule is idempotent across restarts.
    fn reconcile(&self, record: ScanRecord, now: DateTime<Utc>) -> ScanRecord {
        if record.status == ScanStatus::InProgress
            && now - record.started_at > self.in_progress_stale_after
        {
            tracing::warn!(
                scan_id = %record.id,
                started_at = %record.started_at,
                "In-progress scan record exceeded staleness bound, reporting as failed"
            );
            return record.fail("scan did not reach a terminal state", now);
        }
        record
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn save_scan_record(&self, record: &ScanRecord) -> Result<()> {
        Self::write_json(&self.scan_path(record.id), record)?;
        tracing::debug!(scan_id = %record.id, status = ?record.status, "Scan record saved");
        Ok(())
    }

    fn get_scan_record(&self, id: Uuid) -> Result<ScanRecord> {
        let path = self.scan_path(id);
        if !path.exists() {
            return Err(StoreError::ScanNotFound(id));
        }
        let record: ScanRecord = Self::read_json(&path)?;
        Ok(self.reconcile(record, Utc::now()))
    }

    fn load_scan_history(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        let now = Utc::now();
        let mut records = Vec::new();
        for entry in fs::read_dir(self.root.join("scans"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let record: ScanRecord = Self::read_json(&path)?;
                records.push(self.reconcile(record, now));
            }
        }
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit);
        Ok(records)
    }

    fn upsert_device(&self, device: &Device) -> Result<()> {
        Self::write_json(&self.device_path(device.id), device)
    }

    fn get_all_devices(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        for entry in fs::read_dir(self.root.join("devices"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                devices.push(Self::read_json(&path)?);
            }
        }
        Ok(devices)
    }

    fn delete_device(&self, id: Uuid) -> Result<()> {
        let path = self.device_path(id);
        if !path.exists() {
            return Err(StoreError::DeviceNotFound(id));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn save_auto_scan_config(&self, config: &AutoScanConfig) -> Result<()> {
        let path = self.config_path();
        let tmp = path.with_extension("json.tmp");
        Self::write_json(&tmp, config)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load_auto_scan_config(&self) -> Result<Option<AutoScanConfig>> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_json(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn scan_record_roundtrip() {
        let (_dir, store) = open_store();
        let record = ScanRecord::begin("192.168.1.1", "192.168.1.20", Utc::now());
        let id = record.id;

        store.save_scan_record(&record).unwrap();
        let loaded = store.get_scan_record(id).unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.status, ScanStatus::InProgress);

        let completed = record.complete(3, Utc::now());
        store.save_scan_record(&completed).unwrap();
        let loaded = store.get_scan_record(id).unwrap();
        assert_eq!(loaded.status, ScanStatus::Completed);
        assert_eq!(loaded.devices_found, 3);
    }

    #[test]
    fn missing_scan_record_is_not_found() {
        let (_dir, store) = open_store();
        let result = store.get_scan_record(Uuid::new_v4());
        assert!(matches!(result, Err(StoreError::ScanNotFound(_))));
    }

    #[test]
    fn stale_in_progress_record_reads_as_failed() {
        let (_dir, store) = open_store();
        let old = Utc::now() - TimeDelta::minutes(45);
        let record = ScanRecord::begin("10.0.0.1", "10.0.0.50", old);
        store.save_scan_record(&record).unwrap();

        let loaded = store.get_scan_record(record.id).unwrap();
        assert_eq!(loaded.status, ScanStatus::Failed);
        assert!(loaded.error.is_some());

        // Idempotent: the on-disk record is untouched and reconciles the
        // same way on every read.
        let again = store.get_scan_record(record.id).unwrap();
        assert_eq!(again.status, ScanStatus::Failed);
    }

    #[test]
    fn recent_in_progress_record_is_left_alone() {
        let (_dir, store) = open_store();
        let record = ScanRecord::begin("10.0.0.1", "10.0.0.50", Utc::now());
        store.save_scan_record(&record).unwrap();

        let loaded = store.get_scan_record(record.id).unwrap();
        assert_eq!(loaded.status, ScanStatus::InProgress);
    }

    #[test]
    fn history_is_ordered_and_limited() {
        let (_dir, store) = open_store();
        let base = Utc::now();
        for offset in 0..5 {
            let record = ScanRecord::begin("10.0.0.1", "10.0.0.5", base - TimeDelta::minutes(offset))
                .complete(0, base);
            store.save_scan_record(&record).unwrap();
        }

        let history = store.load_scan_history(3).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].started_at >= w[1].started_at));
        assert_eq!(history[0].started_at, base);
    }

    #[test]
    fn device_roundtrip_and_delete() {
        let (_dir, store) = open_store();
        let mut device = Device::new("192.168.1.7", Utc::now());
        device.mac = Some("AA:BB:CC:DD:EE:FF".to_string());

        store.upsert_device(&device).unwrap();
        let all = store.get_all_devices().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));

        store.delete_device(device.id).unwrap();
        assert!(store.get_all_devices().unwrap().is_empty());
        assert!(matches!(
            store.delete_device(device.id),
            Err(StoreError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn config_roundtrip() {
        let (_dir, store) = open_store();
        assert!(store.load_auto_scan_config().unwrap().is_none());

        let mut config = AutoScanConfig::default();
        config.enabled = true;
        config.interval_minutes = 5;
        store.save_auto_scan_config(&config).unwrap();

        let loaded = store.load_auto_scan_config().unwrap().unwrap();
        assert_eq!(loaded, config);
    }
}
