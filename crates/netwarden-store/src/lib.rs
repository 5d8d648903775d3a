//! netwarden-store: Persistence for scan records, devices, and configuration.
//!
//! The discovery engine consumes the [`Store`] trait; [`JsonStore`] is the
//! file-backed implementation used by the CLI and by tests.

pub mod store;

pub use store::{JsonStore, Store, StoreError};
