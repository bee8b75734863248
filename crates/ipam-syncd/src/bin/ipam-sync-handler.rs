// # ipam-sync-handler - event-triggered run
//
// Reads one JSON trigger event from stdin, runs discovery only (no
// expiration sweep) and writes the discovery summary as JSON to stdout.
// Nothing is kept between invocations.
//
// The event must be piped in (`echo '{}' | ipam-sync-handler`). When stdin
// is a terminal no event is read and the run starts immediately.

use ipam_syncd::{Config, SyncExitCode, build_reconciler, init_tracing, parse_event, runtime};
use std::io::{IsTerminal, Read};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
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

    let mut raw = String::new();
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        debug!("stdin is a terminal, not waiting for a trigger event");
    } else if let Err(e) = stdin.lock().read_to_string(&mut raw) {
        error!("Failed to read trigger event: {}", e);
        return SyncExitCode::RuntimeError.into();
    }
    log_event(&raw);

    let rt = match runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let reconciler = build_reconciler(&config)?;
        reconciler.run_discovery().await
    });

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("Discovery failed: {}", e);
            return SyncExitCode::for_error(&e).into();
        }
    };

    match serde_json::to_string(&summary) {
        Ok(json) => {
            println!("{}", json);
            SyncExitCode::Success.into()
        }
        Err(e) => {
            error!("Failed to serialize summary: {}", e);
            SyncExitCode::RuntimeError.into()
        }
    }
}

// The event content does not steer the run
fn log_event(raw: &str) {
    match parse_event(raw) {
        Ok(None) => info!("Triggered without an event payload"),
        Ok(Some(event)) => debug!("Trigger event: {}", event),
        Err(e) => warn!("Trigger event is not valid JSON ({}), continuing", e),
    }
}
