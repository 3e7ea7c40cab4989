use crate::commands::common::{
    drain_if_online, normalize_note_identifier, open_service, resolve_note, AppContext,
};
use crate::error::CliError;

pub async fn run_delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let service = open_service(ctx).await?;
    let note = resolve_note(&normalized_id, &service).await?;

    let deleted = service.soft_delete(&note.id).await?;
    drain_if_online(&service).await?;
    println!("{}", deleted.id);
    Ok(())
}

pub async fn run_restore(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let service = open_service(ctx).await?;
    let note = resolve_note(&normalized_id, &service).await?;

    let restored = service.restore(&note.id).await?;
    drain_if_online(&service).await?;
    println!("{}", restored.id);
    Ok(())
}

pub async fn run_purge(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let service = open_service(ctx).await?;
    let note = resolve_note(&normalized_id, &service).await?;

    service.purge(&note.id).await?;
    println!("{}", note.id);
    Ok(())
}
