use quire_core::editor::derive_title;
use quire_core::GroupId;

use crate::commands::common::{drain_if_online, open_service, resolve_note_content, AppContext};
use crate::error::CliError;

pub async fn run_new(
    ctx: &AppContext,
    title: Option<&str>,
    group: Option<&str>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;
    let group_id = match group {
        Some(raw) => raw
            .trim()
            .parse::<GroupId>()
            .map_err(|_| CliError::InvalidGroup(raw.to_string()))?,
        None => GroupId::Staple,
    };
    let title = title.map_or_else(
        || derive_title(&content, ctx.settings.title_max_chars),
        |title| title.trim().to_string(),
    );

    let service = open_service(ctx).await?;
    let note = service
        .create_note(ctx.container.clone(), group_id, &title, &content, &content)
        .await?;
    drain_if_online(&service).await?;

    let stored = service.get_note(&note.id).await?;
    println!("{}", stored.map_or(note.id, |stored| stored.id));
    Ok(())
}

pub async fn run_tab(ctx: &AppContext, name: &str) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let (_, note) = service.create_tab(ctx.container.clone(), name).await?;
    drain_if_online(&service).await?;

    let stored = service.get_note(&note.id).await?.unwrap_or_else(|| note.clone());
    println!("{}\t{}", stored.group_id, stored.id);
    Ok(())
}
