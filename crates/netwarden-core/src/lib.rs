//! netwarden-core: Shared domain types for the netwarden network monitor.
//!
//! This crate provides the types passed between the discovery engine, the
//! persistence layer, and external callers:
//! - `Device` — one tracked network host
//! - `ScanRecord` — the lifecycle of one sweep execution
//! - `AutoScanConfig` — the persisted auto-scan configuration

pub mod types;

pub use types::{
    AutoScanConfig, AutoScanConfigPatch, Device, DeviceStatus, DeviceType, PortService,
    ScanRecord, ScanStatus,
};
