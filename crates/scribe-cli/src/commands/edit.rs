use scribe_core::models::NotePayload;

use crate::commands::common::{
    capture_editor_input_with_initial, collect_tags, load_note, report_save, resolve_note_id,
};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_edit(
    ctx: &AppContext,
    id: &str,
    title: Option<String>,
    category: Option<String>,
    tags: &[String],
) -> Result<(), CliError> {
    let id = resolve_note_id(id, ctx).await?;
    let note = load_note(&id, ctx).await?.note;

    let Some(content) = capture_editor_input_with_initial(&note.content)? else {
        return Err(CliError::EmptyContent);
    };

    let tags = if tags.is_empty() {
        note.tag_names()
    } else {
        collect_tags(tags)
    };
    let payload = NotePayload::new(
        title.unwrap_or_else(|| note.title.clone()),
        content,
        category.or_else(|| note.category.clone()),
        tags,
    );

    if payload == note.payload() {
        println!("{}  (no changes)", note.id);
        return Ok(());
    }

    let outcome = ctx.editor.update(note.id, payload).await?;
    report_save(&outcome)
}
