//! CLI entry point for the netwarden-discover engine.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use netwarden_core::types::AutoScanConfigPatch;
use netwarden_store::JsonStore;

use netwarden_discover::config::DiscoverConfig;
use netwarden_discover::coordinator::ScanCoordinator;
use netwarden_discover::probe::PingProbe;
use netwarden_discover::registry::DeviceRegistry;
use netwarden_discover::resolve::vendor::HttpVendorLookup;
use netwarden_discover::resolve::IdentificationResolver;
use netwarden_discover::scheduler::{AutoScanScheduler, TracingSink};

#[derive(Parser)]
#[command(name = "netwarden-discover")]
#[command(about = "LAN device discovery and change tracking")]
struct Cli {
    /// First address of the range to scan.
    #[arg(long)]
    start_ip: Option<String>,

    /// Last address of the range to scan.
    #[arg(long)]
    end_ip: Option<String>,

    /// Run a single one-shot scan and exit.
    #[arg(long)]
    once: bool,

    /// Run as daemon with scheduled auto-scans.
    #[arg(long)]
    daemon: bool,

    /// Auto-scan interval in minutes (daemon mode; persisted).
    #[arg(long)]
    interval: Option<u64>,

    /// Config file prefix (default: netwarden).
    #[arg(short, long, default_value = "netwarden")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let discover_config = load_discover_config(&cli.config)?;

    // The store is the one collaborator we cannot run without.
    let store = Arc::new(JsonStore::open(&discover_config.data_dir)?);
    tracing::info!(data_dir = %discover_config.data_dir, "Store opened");

    let probe = Arc::new(PingProbe::new(Duration::from_millis(
        discover_config.ping_timeout_ms,
    )));
    let vendors = Arc::new(HttpVendorLookup::new(
        discover_config.vendor_url.clone(),
        Duration::from_millis(discover_config.vendor_timeout_ms),
    ));
    let resolver = Arc::new(IdentificationResolver::new(vendors, &discover_config));
    let registry = Arc::new(DeviceRegistry::load(store.clone())?);
    let coordinator = Arc::new(ScanCoordinator::new(
        probe,
        resolver,
        registry.clone(),
        store.clone(),
        discover_config.effective_worker_limit(),
    ));

    if cli.once {
        let (start_ip, end_ip) = require_range(&cli)?;
        let outcome = coordinator.run_scan(start_ip, end_ip).await?;
        println!("{}", serde_json::to_string_pretty(&outcome.record)?);
        for device in registry.list_all().await {
            println!("{}", serde_json::to_string(&device)?);
        }
    } else if cli.daemon {
        let scheduler = AutoScanScheduler::new(
            coordinator,
            registry,
            store,
            Arc::new(TracingSink),
        )?;

        let patch = AutoScanConfigPatch {
            start_ip: cli.start_ip.clone(),
            end_ip: cli.end_ip.clone(),
            interval_minutes: cli.interval,
            ..Default::default()
        };
        scheduler.update_config(patch).await?;

        scheduler.start().await?;
        tokio::signal::ctrl_c().await?;
        scheduler.stop().await?;
    } else {
        anyhow::bail!("Specify --once (one-shot scan) or --daemon (scheduled scanning)");
    }

    Ok(())
}

fn require_range(cli: &Cli) -> anyhow::Result<(&str, &str)> {
    match (cli.start_ip.as_deref(), cli.end_ip.as_deref()) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => anyhow::bail!("--start-ip and --end-ip are required in --once mode"),
    }
}

fn load_discover_config(file_prefix: &str) -> anyhow::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("NETWARDEN_DISCOVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(_) => Ok(DiscoverConfig::default()),
    }
}
