use crate::commands::common::{
    format_note_lines, note_to_list_item, pending_note_ids, NoteListItem,
};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_list(ctx: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let notes = ctx
        .store()
        .all_notes()
        .await?
        .into_iter()
        .take(limit)
        .collect::<Vec<_>>();
    let pending = pending_note_ids(ctx).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(|note| note_to_list_item(note, &pending))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes, &pending) {
            println!("{line}");
        }
    }

    Ok(())
}
