use quire_core::repository::NoteQuery;

use crate::commands::common::{
    format_note_lines, note_to_list_item, open_service, AppContext, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    ctx: &AppContext,
    limit: usize,
    include_deleted: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let service = open_service(ctx).await?;
    let query = NoteQuery::container(ctx.container.clone()).with_deleted(include_deleted);
    let mut notes = service.list_notes(&query).await?;
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
