use league_core::utils::TimeEstimation;
use chrono::Utc;
use env_logger::Env;
use log::info;
use std::env;
use std::sync::Arc;
use store::{BootstrapConfig, Bootstrapper, Store};
use web::{AppData, LeagueOpsServer, ServerConfig};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() {
    color_eyre::install().unwrap();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();
    let store = Arc::new(Store::new());

    // One-time world build for fixed-size bot leagues; idempotent per month.
    if env::var("BOOTSTRAP_ON_START").as_deref() == Ok("1") {
        let bootstrap_config = BootstrapConfig {
            league_count: config.league_count,
            ..BootstrapConfig::default()
        };
        let (report, estimated) =
            TimeEstimation::estimate(|| Bootstrapper::run(&store, &bootstrap_config, Utc::now()));
        match report {
            Ok(report) if report.skipped => {
                info!("bootstrap skipped for {} ({} ms)", report.month_key, estimated)
            }
            Ok(report) => info!(
                "bootstrap built {} leagues / {} fixtures in {} ms",
                report.leagues, report.fixtures, estimated
            ),
            Err(e) => panic!("bootstrap failed: {}", e),
        }
    }

    let data = AppData::new(store, config);

    LeagueOpsServer::new(data).run().await;
}
