use crate::commands::common::{open_service, AppContext};
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    if ctx.settings.remote_url.is_none() {
        return Err(CliError::SyncNotConfigured);
    }
    if ctx.settings.offline {
        return Err(CliError::Offline);
    }

    let service = open_service(ctx).await?;
    let Some(report) = service.drain_now().await? else {
        return Err(CliError::Offline);
    };

    println!(
        "Sync completed: {} updated, {} created, {} dropped, {} failed",
        report.synced, report.promoted, report.dropped, report.failed
    );
    let pending = service.pending_count().await?;
    if pending > 0 {
        println!("{pending} write(s) still pending");
    }
    Ok(())
}
