//! Core domain types for the netwarden network monitor.
//!
//! These types are shared across the discovery engine, the persistence
//! layer, and the request/response surface exposed to external callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Devices ───────────────────────────────────────────────────────

/// A network-attached host tracked across scans.
///
/// `id` is assigned at first observation and never changes; `ip` and `mac`
/// are mutable because devices get new DHCP leases and interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Current IPv4 address in dotted-quad form.
    pub ip: String,
    /// Hardware address, canonical uppercase colon-separated form.
    pub mac: Option<String>,
    /// Best-effort resolved hostname or user-assigned label.
    pub name: Option<String>,
    pub device_type: DeviceType,
    /// Vendor string derived from the MAC prefix; "Unknown" if unresolved.
    pub manufacturer: String,
    pub status: DeviceStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Create a device at first observation: `first_seen == last_seen`.
    pub fn new(ip: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip: ip.into(),
            mac: None,
            name: None,
            device_type: DeviceType::Unknown,
            manufacturer: "Unknown".to_string(),
            status: DeviceStatus::Online,
            first_seen: now,
            last_seen: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Coarse device classification inferred from the open-port signature.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Router,
    Server,
    Workstation,
    Printer,
    NasStorage,
    #[default]
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceType::Router => "router",
            DeviceType::Server => "server",
            DeviceType::Workstation => "workstation",
            DeviceType::Printer => "printer",
            DeviceType::NasStorage => "nas_storage",
            DeviceType::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A responsive service port discovered on a host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortService {
    pub port: u16,
    pub service: String,
}

/// Canonicalize a hardware address to uppercase colon-separated form.
///
/// Accepts `:` or `-` separated input, or a bare 12-hex-digit string.
/// Returns `None` when the input is not a well-formed 48-bit address.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let pairs: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Some(pairs.join(":"))
}

// ── Scan records ──────────────────────────────────────────────────

/// One sweep execution.
///
/// Created `in_progress` when a sweep begins and persisted immediately so
/// status is externally observable; transitions exactly once to
/// `completed` or `failed` and is immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub start_ip: String,
    pub end_ip: String,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Count of hosts found alive in this sweep.
    pub devices_found: u32,
    pub error: Option<String>,
}

impl ScanRecord {
    pub fn begin(start_ip: impl Into<String>, end_ip: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_ip: start_ip.into(),
            end_ip: end_ip.into(),
            status: ScanStatus::InProgress,
            started_at: now,
            completed_at: None,
            devices_found: 0,
            error: None,
        }
    }

    pub fn complete(mut self, devices_found: u32, now: DateTime<Utc>) -> Self {
        self.status = ScanStatus::Completed;
        self.devices_found = devices_found;
        self.completed_at = Some(now);
        self
    }

    pub fn fail(mut self, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        self.status = ScanStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    InProgress,
    Completed,
    Failed,
}

// ── Auto-scan configuration ───────────────────────────────────────

/// Process-wide auto-scan configuration.
///
/// Loaded at startup, mutated via explicit update calls, and persisted
/// after every mutation. `enabled` is persisted independently of the
/// in-process scheduler state so a restart resumes prior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoScanConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub start_ip: String,
    pub end_ip: String,
    pub notify_on_changes: bool,
}

impl Default for AutoScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 30,
            start_ip: "192.168.1.1".to_string(),
            end_ip: "192.168.1.254".to_string(),
            notify_on_changes: true,
        }
    }
}

/// Partial update to [`AutoScanConfig`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoScanConfigPatch {
    pub enabled: Option<bool>,
    pub interval_minutes: Option<u64>,
    pub start_ip: Option<String>,
    pub end_ip: Option<String>,
    pub notify_on_changes: Option<bool>,
}

impl AutoScanConfig {
    /// Merge a patch into this configuration, returning the previous value.
    pub fn apply(&mut self, patch: AutoScanConfigPatch) -> AutoScanConfig {
        let previous = self.clone();
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(interval) = patch.interval_minutes {
            self.interval_minutes = interval.max(1);
        }
        if let Some(start_ip) = patch.start_ip {
            self.start_ip = start_ip;
        }
        if let Some(end_ip) = patch.end_ip {
            self.end_ip = end_ip;
        }
        if let Some(notify) = patch.notify_on_changes {
            self.notify_on_changes = notify;
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_mac_accepts_common_forms() {
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(
            normalize_mac("AA-BB-CC-DD-EE-FF").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(
            normalize_mac("aabbccddeeff").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
    }

    #[test]
    fn normalize_mac_rejects_malformed() {
        assert_eq!(normalize_mac("aa:bb:cc"), None);
        assert_eq!(normalize_mac("zz:bb:cc:dd:ee:ff"), None);
        assert_eq!(normalize_mac(""), None);
    }

    #[test]
    fn scan_record_lifecycle() {
        let now = Utc::now();
        let record = ScanRecord::begin("192.168.1.1", "192.168.1.20", now);
        assert_eq!(record.status, ScanStatus::InProgress);
        assert!(record.completed_at.is_none());

        let done = record.clone().complete(4, now);
        assert_eq!(done.status, ScanStatus::Completed);
        assert_eq!(done.devices_found, 4);
        assert!(done.completed_at.is_some());

        let failed = record.fail("range too large", now);
        assert_eq!(failed.status, ScanStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("range too large"));
    }

    #[test]
    fn config_patch_merges_only_present_fields() {
        let mut config = AutoScanConfig::default();
        config.apply(AutoScanConfigPatch {
            interval_minutes: Some(5),
            ..Default::default()
        });
        assert_eq!(config.interval_minutes, 5);
        assert!(!config.enabled);
        assert_eq!(config.start_ip, "192.168.1.1");
    }

    #[test]
    fn device_serialization_roundtrip() {
        let now = Utc::now();
        let mut device = Device::new("10.0.1.42", now);
        device.mac = Some("AA:BB:CC:DD:EE:FF".to_string());
        device.name = Some("web-server-01".to_string());
        device.device_type = DeviceType::Server;

        let json = serde_json::to_string(&device).unwrap();
        let back: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, device.id);
        assert_eq!(back.mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(back.device_type, DeviceType::Server);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DeviceStatus::Online).unwrap(),
            "\"online\""
        );
        assert_eq!(
            serde_json::to_string(&ScanStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }
}
