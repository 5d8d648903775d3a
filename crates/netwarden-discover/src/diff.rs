//! Change detection between two device snapshots.
//!
//! Pure computation, no I/O: two device sets in, a [`ChangeSet`] out.
//! Snapshots are matched by IP address because a sweep's found-device list
//! is IP-addressed.

use std::collections::HashMap;

use serde::Serialize;

use netwarden_core::types::Device;

/// A single differing tracked field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A device present in both snapshots with at least one differing field.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceChange {
    pub previous: Device,
    pub current: Device,
    pub diffs: Vec<FieldDiff>,
}

/// The new/disappeared/changed classification for one scan-to-scan
/// comparison. Computed on demand and handed to notification logic;
/// never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    pub new_devices: Vec<Device>,
    pub disappeared_devices: Vec<Device>,
    pub changed_devices: Vec<DeviceChange>,
}

impl ChangeSet {
    /// Any change at all is significant; there is no magnitude threshold.
    pub fn is_significant(&self) -> bool {
        !self.new_devices.is_empty()
            || !self.disappeared_devices.is_empty()
            || !self.changed_devices.is_empty()
    }
}

/// Compare a current device snapshot against a baseline.
pub fn diff(baseline: &[Device], current: &[Device]) -> ChangeSet {
    let baseline_by_ip: HashMap<&str, &Device> =
        baseline.iter().map(|d| (d.ip.as_str(), d)).collect();
    let current_by_ip: HashMap<&str, &Device> =
        current.iter().map(|d| (d.ip.as_str(), d)).collect();

    let mut changes = ChangeSet::default();

    for device in current {
        match baseline_by_ip.get(device.ip.as_str()) {
            None => changes.new_devices.push(device.clone()),
            Some(previous) => {
                let diffs = field_diffs(previous, device);
                if !diffs.is_empty() {
                    changes.changed_devices.push(DeviceChange {
                        previous: (*previous).clone(),
                        current: device.clone(),
                        diffs,
                    });
                }
            }
        }
    }

    for device in baseline {
        if !current_by_ip.contains_key(device.ip.as_str()) {
            changes.disappeared_devices.push(device.clone());
        }
    }

    changes
}

/// Diff the tracked fields {mac, name, device_type, status}; only
/// differing fields are reported.
fn field_diffs(previous: &Device, current: &Device) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if previous.mac != current.mac {
        diffs.push(FieldDiff {
            field: "mac",
            from: previous.mac.clone(),
            to: current.mac.clone(),
        });
    }
    if previous.name != current.name {
        diffs.push(FieldDiff {
            field: "name",
            from: previous.name.clone(),
            to: current.name.clone(),
        });
    }
    if previous.device_type != current.device_type {
        diffs.push(FieldDiff {
            field: "device_type",
            from: Some(previous.device_type.to_string()),
            to: Some(current.device_type.to_string()),
        });
    }
    if previous.status != current.status {
        diffs.push(FieldDiff {
            field: "status",
            from: Some(previous.status.to_string()),
            to: Some(current.status.to_string()),
        });
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netwarden_core::types::{DeviceStatus, DeviceType};

    fn device(ip: &str) -> Device {
        Device::new(ip, Utc::now())
    }

    #[test]
    fn detects_new_and_disappeared() {
        let baseline = vec![device("10.0.0.1"), device("10.0.0.2")];
        let current = vec![device("10.0.0.2"), device("10.0.0.3")];

        let changes = diff(&baseline, &current);
        assert_eq!(changes.new_devices.len(), 1);
        assert_eq!(changes.new_devices[0].ip, "10.0.0.3");
        assert_eq!(changes.disappeared_devices.len(), 1);
        assert_eq!(changes.disappeared_devices[0].ip, "10.0.0.1");
        assert!(changes.changed_devices.is_empty());
    }

    #[test]
    fn reports_only_differing_fields() {
        let mut before = device("10.0.0.1");
        before.mac = Some("AA:BB:CC:DD:EE:FF".to_string());
        before.name = Some("old-name".to_string());

        let mut after = before.clone();
        after.name = Some("new-name".to_string());
        after.status = DeviceStatus::Offline;

        let changes = diff(&[before], &[after]);
        assert_eq!(changes.changed_devices.len(), 1);
        let diffs = &changes.changed_devices[0].diffs;
        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().any(|d| d.field == "name"
            && d.from.as_deref() == Some("old-name")
            && d.to.as_deref() == Some("new-name")));
        assert!(diffs.iter().any(|d| d.field == "status"
            && d.from.as_deref() == Some("online")
            && d.to.as_deref() == Some("offline")));
    }

    #[test]
    fn device_type_change_is_tracked() {
        let before = device("10.0.0.1");
        let mut after = before.clone();
        after.device_type = DeviceType::Router;

        let changes = diff(&[before], &[after]);
        let diffs = &changes.changed_devices[0].diffs;
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "device_type");
        assert_eq!(diffs[0].to.as_deref(), Some("router"));
    }

    #[test]
    fn identical_snapshots_produce_no_changes() {
        let snapshot = vec![device("10.0.0.1"), device("10.0.0.2")];
        let changes = diff(&snapshot, &snapshot);
        assert!(!changes.is_significant());
    }

    #[test]
    fn diff_is_symmetric_for_new_and_disappeared() {
        let baseline = vec![device("10.0.0.1"), device("10.0.0.2")];
        let current = vec![device("10.0.0.2"), device("10.0.0.3")];

        let forward = diff(&baseline, &current);
        let backward = diff(&current, &baseline);

        let forward_new: Vec<&str> =
            forward.new_devices.iter().map(|d| d.ip.as_str()).collect();
        let backward_gone: Vec<&str> = backward
            .disappeared_devices
            .iter()
            .map(|d| d.ip.as_str())
            .collect();
        assert_eq!(forward_new, backward_gone);
    }

    #[test]
    fn any_nonempty_list_is_significant() {
        let empty = ChangeSet::default();
        assert!(!empty.is_significant());

        let changes = diff(&[], &[device("10.0.0.1")]);
        assert!(changes.is_significant());

        let changes = diff(&[device("10.0.0.1")], &[]);
        assert!(changes.is_significant());
    }
}
