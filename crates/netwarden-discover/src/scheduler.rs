//! Periodic auto-scan loop.
//!
//! One long-lived timer task triggers sweeps at the configured interval,
//! feeds each completed sweep through change detection, and raises a
//! notification when the change set is significant. Stopping the scheduler
//! never aborts an in-flight sweep; the shutdown signal is observed
//! between ticks, so the current sweep runs to completion and the next
//! tick is simply not scheduled.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration};

use netwarden_core::types::{AutoScanConfig, AutoScanConfigPatch, Device, DeviceStatus, ScanRecord, ScanStatus};
use netwarden_store::Store;

use crate::coordinator::ScanCoordinator;
use crate::diff::{self, ChangeSet};
use crate::error::Result;
use crate::registry::DeviceRegistry;

/// Receives the change set of a completed auto-scan; invoked at most once
/// per completed scan. Delivery (UI push, log, email) is the sink's
/// concern.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, scan: &ScanRecord, changes: &ChangeSet);
}

/// Default sink: structured log entry with the serialized change set.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, scan: &ScanRecord, changes: &ChangeSet) {
        tracing::info!(
            scan_id = %scan.id,
            new = changes.new_devices.len(),
            disappeared = changes.disappeared_devices.len(),
            changed = changes.changed_devices.len(),
            change_set = %serde_json::to_string(changes).unwrap_or_default(),
            "Network change detected"
        );
    }
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
}

struct Inner {
    config: AutoScanConfig,
    current: Option<LoopHandle>,
}

pub struct AutoScanScheduler {
    coordinator: Arc<ScanCoordinator>,
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn Store>,
    sink: Arc<dyn NotificationSink>,
    inner: Mutex<Inner>,
}

impl AutoScanScheduler {
    /// Build the scheduler with configuration loaded from the store (or
    /// defaults on first run). Does not start the loop; call [`resume`]
    /// to honor a persisted `enabled = true`.
    ///
    /// [`resume`]: AutoScanScheduler::resume
    pub fn new(
        coordinator: Arc<ScanCoordinator>,
        registry: Arc<DeviceRegistry>,
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let config = store.load_auto_scan_config()?.unwrap_or_default();
        Ok(Self {
            coordinator,
            registry,
            store,
            sink,
            inner: Mutex::new(Inner {
                config,
                current: None,
            }),
        })
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.current.is_some()
    }

    pub async fn config(&self) -> AutoScanConfig {
        self.inner.lock().await.config.clone()
    }

    /// Start the loop if the persisted configuration says it was enabled.
    pub async fn resume(&self) -> Result<()> {
        if self.config().await.enabled {
            self.start().await?;
        }
        Ok(())
    }

    /// Start periodic scanning: one immediate scan, then one per interval.
    /// Idempotent when already running. Persists `enabled = true`.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.current.is_some() {
            return Ok(());
        }
        inner.config.enabled = true;
        self.store.save_auto_scan_config(&inner.config)?;
        inner.current = Some(self.spawn_loop(inner.config.clone()));
        tracing::info!(
            interval_minutes = inner.config.interval_minutes,
            start_ip = %inner.config.start_ip,
            end_ip = %inner.config.end_ip,
            "Auto-scan scheduler started"
        );
        Ok(())
    }

    /// Stop periodic scanning. Idempotent when already stopped. Persists
    /// `enabled = false`. An in-flight sweep is not aborted.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.current.take() {
            let _ = handle.shutdown.send(true);
            tracing::info!("Auto-scan scheduler stopped");
        }
        if inner.config.enabled {
            inner.config.enabled = false;
            self.store.save_auto_scan_config(&inner.config)?;
        }
        Ok(())
    }

    /// Merge a partial configuration update and persist it atomically with
    /// the mutation. An interval or target change while running restarts
    /// the timer exactly once so no tick fires on the stale period;
    /// `enabled` transitions start or stop the loop.
    pub async fn update_config(&self, patch: AutoScanConfigPatch) -> Result<AutoScanConfig> {
        let mut inner = self.inner.lock().await;
        let was_running = inner.current.is_some();
        let previous = inner.config.apply(patch);
        self.store.save_auto_scan_config(&inner.config)?;

        let timer_stale = previous.interval_minutes != inner.config.interval_minutes
            || previous.start_ip != inner.config.start_ip
            || previous.end_ip != inner.config.end_ip;

        match (was_running, inner.config.enabled) {
            (false, true) => {
                inner.current = Some(self.spawn_loop(inner.config.clone()));
                tracing::info!("Auto-scan enabled via config update");
            }
            (true, false) => {
                if let Some(handle) = inner.current.take() {
                    let _ = handle.shutdown.send(true);
                }
                tracing::info!("Auto-scan disabled via config update");
            }
            (true, true) if timer_stale => {
                if let Some(handle) = inner.current.take() {
                    let _ = handle.shutdown.send(true);
                }
                inner.current = Some(self.spawn_loop(inner.config.clone()));
                tracing::info!(
                    interval_minutes = inner.config.interval_minutes,
                    "Auto-scan timer restarted with updated configuration"
                );
            }
            _ => {}
        }

        Ok(inner.config.clone())
    }

    fn spawn_loop(&self, config: AutoScanConfig) -> LoopHandle {
        let (shutdown, mut rx) = watch::channel(false);
        let coordinator = self.coordinator.clone();
        let registry = self.registry.clone();
        let sink = self.sink.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(config.interval_minutes.max(1) * 60));
            let mut baseline: Option<Vec<Device>> = None;

            loop {
                tokio::select! {
                    biased;
                    _ = rx.changed() => break,
                    _ = ticker.tick() => {
                        run_auto_scan(&coordinator, &registry, sink.as_ref(), &config, &mut baseline)
                            .await;
                    }
                }
            }
            tracing::debug!("Auto-scan loop exited");
        });

        LoopHandle { shutdown }
    }
}

/// One scheduler tick. Any failure is logged and swallowed so the next
/// tick still fires.
async fn run_auto_scan(
    coordinator: &ScanCoordinator,
    registry: &DeviceRegistry,
    sink: &dyn NotificationSink,
    config: &AutoScanConfig,
    baseline: &mut Option<Vec<Device>>,
) {
    // The previously recorded device set: the prior sweep's findings, or
    // on the first tick the devices currently believed online.
    let before = match baseline.clone() {
        Some(devices) => devices,
        None => registry
            .list_all()
            .await
            .into_iter()
            .filter(|d| d.status == DeviceStatus::Online)
            .collect(),
    };

    match coordinator.run_scan(&config.start_ip, &config.end_ip).await {
        Ok(outcome) if outcome.record.status == ScanStatus::Completed => {
            let cutoff = Utc::now() - TimeDelta::minutes(config.interval_minutes as i64 * 2);
            if let Err(e) = registry.mark_stale_offline(cutoff).await {
                tracing::warn!(error = %e, "Staleness pass failed");
            }

            let changes = diff::diff(&before, &outcome.devices);
            if config.notify_on_changes && changes.is_significant() {
                sink.notify(&outcome.record, &changes).await;
            }
            *baseline = Some(outcome.devices);
        }
        Ok(outcome) => {
            tracing::warn!(
                scan_id = %outcome.record.id,
                error = ?outcome.record.error,
                "Scheduled scan did not complete"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Scheduled scan failed");
        }
    }
}
