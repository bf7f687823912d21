mod config;
mod main_lib;

use cloudinfo_engine::shutdown::CancellationSignal;
use cloudinfo_engine::CloudInfo;
use config::Config;
use main_lib::{init_tracing, load_infoers, summary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    let engine_config = config.engine_config()?;
    let infoers = load_infoers(&config.catalog_dir)?;
    let cloud_info = CloudInfo::new(engine_config, infoers)?;

    if config.run_once {
        cloud_info.renew_now(&CancellationSignal::never()).await;
        println!("{}", serde_json::to_string_pretty(&summary(&cloud_info))?);
        return Ok(());
    }

    let handle = cloud_info.start();
    tracing::info!("Serving {} provider(s), press Ctrl+C to stop", cloud_info.get_providers().len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    handle.shutdown().await;
    tracing::info!("{}", summary(&cloud_info));
    Ok(())
}
