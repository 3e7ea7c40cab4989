use serde::Serialize;

use crate::commands::common::{open_service, AppContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub online: bool,
    pub pending: usize,
    pub remote_url: Option<String>,
    pub db_path: String,
    pub container: String,
}

pub async fn run_status(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let report = StatusReport {
        online: service.is_online(),
        pending: service.pending_count().await?,
        remote_url: ctx.settings.remote_url.clone(),
        db_path: ctx.db_path.display().to_string(),
        container: ctx.container.to_string(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    vec![
        format!(
            "Status:    {}",
            if report.online { "online" } else { "offline" }
        ),
        format!("Pending:   {}", report.pending),
        format!(
            "Remote:    {}",
            report.remote_url.as_deref().unwrap_or("(local only)")
        ),
        format!("Notebook:  {}", report.container),
        format!("Database:  {}", report.db_path),
    ]
}
