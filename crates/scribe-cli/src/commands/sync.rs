use scribe_core::sync::SyncReport;

use crate::commands::common::{format_pending_lines, pending_to_item, PendingItem};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    if !ctx.remote().is_configured() {
        return Err(CliError::Config(
            "no notes API configured; set SCRIBE_API_URL or pass --api-url".to_string(),
        ));
    }

    let report = ctx.manager().sync().await?;
    println!("{}", format_sync_report(&report));
    Ok(())
}

pub async fn run_sync_pending(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let operations = ctx.store().pending_operations().await?;

    if as_json {
        let json_items = operations
            .iter()
            .map(pending_to_item)
            .collect::<Vec<PendingItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    for line in format_pending_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    if report.skipped_offline {
        return format!(
            "Offline: {} change(s) waiting to sync",
            report.remaining
        );
    }

    let mut summary = format!(
        "Synced {} change(s), {} remaining",
        report.replayed, report.remaining
    );
    if let Some(halt) = &report.halted_on {
        summary.push_str(&format!(
            "\nStopped at entry {} ({} {}): {}",
            halt.operation_id, halt.kind, halt.note_id, halt.error
        ));
    }
    summary
}
