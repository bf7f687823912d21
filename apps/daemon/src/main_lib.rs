use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cloudinfo_engine::cache::PROVIDER_SCOPE;
use cloudinfo_engine::{CatalogInfoer, CloudInfo, Infoer};
use serde_json::{json, Value};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the tracing subscriber. `log` records from the engine are
/// forwarded to it.
pub fn init_tracing() {
    let log_format = std::env::var("CLOUDINFO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// One catalog adapter per `*.json` file of `dir`, in file name order.
pub fn load_infoers(dir: &Path) -> anyhow::Result<Vec<Arc<dyn Infoer>>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read catalog directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut infoers: Vec<Arc<dyn Infoer>> = Vec::with_capacity(paths.len());
    for path in paths {
        let infoer = CatalogInfoer::from_file(&path)?;
        tracing::info!("Loaded catalog '{}' from {}", infoer.id(), path.display());
        infoers.push(Arc::new(infoer));
    }

    if infoers.is_empty() {
        anyhow::bail!("No catalog found in {}", dir.display());
    }
    Ok(infoers)
}

/// Cached regions, VM counts and refresh status of every provider.
pub fn summary(cloud_info: &CloudInfo) -> Value {
    let providers: Vec<Value> = cloud_info
        .get_providers()
        .into_iter()
        .map(|provider| {
            let name = provider.name().to_string();
            let regions: Vec<Value> = cloud_info
                .get_regions(&name)
                .unwrap_or_default()
                .into_keys()
                .map(|region| {
                    let vms = cloud_info
                        .get_product_details(&name, &region)
                        .map(|details| details.len())
                        .unwrap_or(0);
                    json!({
                        "region": region,
                        "vms": vms,
                        "status": cloud_info.status(&name, &region).ok(),
                    })
                })
                .collect();
            json!({
                "provider": name,
                "services": provider.services,
                "shortLivedPrices": cloud_info.has_short_lived_price_info(&name),
                "status": cloud_info.status(&name, PROVIDER_SCOPE).ok(),
                "regions": regions,
            })
        })
        .collect();
    json!({ "providers": providers })
}
