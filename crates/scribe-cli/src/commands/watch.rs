use std::time::Duration;

use crate::context::AppContext;
use crate::error::CliError;

/// Probe the server on an interval and let the sync manager drain on reconnect
pub async fn run_watch(ctx: &AppContext, interval_secs: u64) -> Result<(), CliError> {
    if !ctx.remote().is_configured() {
        return Err(CliError::Config(
            "no notes API configured; set SCRIBE_API_URL or pass --api-url".to_string(),
        ));
    }

    let manager = ctx.manager();
    let mut states = manager.subscribe_state();
    let _subscription = manager.init();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    println!(
        "Watching {} ({} change(s) queued). Press Ctrl-C to stop.",
        if manager.is_online() { "online" } else { "offline" },
        manager.pending_count().await?
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let reachable = ctx.remote().probe().await;
                manager.connectivity().set_online(reachable);
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                let pending = manager.pending_count().await?;
                println!("{state} ({pending} change(s) queued)");
            }
        }
    }

    Ok(())
}
