//! Sales report binary
//!
//! Reads the persisted state and prints the sales summary as JSON. The store
//! is only read: a store that was never opened by the engine reports full
//! capacity available and nothing sold.
//!
//! Usage: `allocation-report [config.toml]`. Without an argument the
//! configuration comes from `ALLOC_*` environment variables.

use allocation_core::{inventory::Inventory, Config, ResourceClass, RocksStore, Store};
use anyhow::Context;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };
    tracing::info!(data_dir = %config.data_dir.display(), "Opening allocation store");

    let store = RocksStore::open(&config).context("Failed to open store")?;
    let holders = store.load_holders()?;

    let capacity = config.inventory.capacity();
    let inventory = match store.load_inventory()? {
        Some(available) => Inventory::restore(available, capacity, config.policy.release),
        None => {
            tracing::warn!("No stored availability, reporting configured capacity");
            Inventory::new(capacity, config.policy.release)
        }
    };

    let summary = inventory.summary();
    for class in ResourceClass::ALL {
        tracing::info!(
            %class,
            sold = summary.sold[class],
            available = summary.available[class],
            capacity = summary.capacity[class],
            "Sales"
        );
    }

    let report = serde_json::json!({
        "holders": holders.len(),
        "sold": summary.sold,
        "available": summary.available,
        "capacity": summary.capacity,
        "total_sold": summary.total_sold(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
