// # ipam-sync - standalone run
//
// One full reconciliation pass: snapshot the address store, discover
// clients from every opted-in network, then expire stale records.
// See the library crate for the environment variables.

use ipam_syncd::{Config, SyncExitCode, build_reconciler, format_elapsed, init_tracing, runtime};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let started = Instant::now();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    if let Err(e) = init_tracing(config.max_level()) {
        eprintln!("{}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting ipam-sync for organization {}", config.meraki_org_id);
    if config.dry_run {
        warn!("Dry-run mode: NetBox will not be modified");
    }

    let rt = match runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let reconciler = build_reconciler(&config)?;
        reconciler.run().await
    });

    match result {
        Ok(summary) => {
            info!(
                "Run finished: {} created, {} updated, {} deleted, {} reserved",
                summary.discovery.created,
                summary.discovery.updated,
                summary.expiration.deleted,
                summary.expiration.reserved
            );
            println!("Sync complete, total runtime {}", format_elapsed(started.elapsed()));
            SyncExitCode::Success.into()
        }
        Err(e) => {
            error!("Sync failed: {}", e);
            SyncExitCode::for_error(&e).into()
        }
    }
}
