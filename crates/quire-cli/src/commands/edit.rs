use crate::commands::common::{
    capture_editor_input_with_initial, drain_if_online, normalize_content,
    normalize_note_identifier, open_service, resolve_note, AppContext,
};
use crate::error::CliError;

pub async fn run_edit(
    ctx: &AppContext,
    id: &str,
    content: Option<&str>,
    title: Option<&str>,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let service = open_service(ctx).await?;
    let note = resolve_note(&normalized_id, &service).await?;

    let edited_content = match (content, title) {
        (Some(content), _) => {
            Some(normalize_content(content).ok_or(CliError::EmptyEditedContent)?)
        }
        (None, Some(_)) => None,
        (None, None) => Some(
            capture_editor_input_with_initial(&note.plain_text)?
                .ok_or(CliError::EmptyEditedContent)?,
        ),
    };

    let session = service.open_session(&note.id).await?;
    if let Some(edited) = edited_content.filter(|edited| *edited != note.plain_text) {
        session.edit_content(edited.clone(), edited).await?;
    }
    if let Some(title) = title {
        session.edit_title(title.trim()).await?;
    }
    let id = session.note().await.id;
    session.close().await?;
    drain_if_online(&service).await?;

    let stored = service.get_note(&id).await?;
    println!("{}", stored.map_or(id, |note| note.id));
    Ok(())
}
