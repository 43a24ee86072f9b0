use scribe_core::models::NotePayload;

use crate::commands::common::{collect_tags, derive_title, report_save, resolve_note_content};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_add(
    ctx: &AppContext,
    title: Option<String>,
    category: Option<String>,
    tags: &[String],
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;
    let title = title.unwrap_or_else(|| derive_title(&content));
    let payload = NotePayload::new(title, content, category, collect_tags(tags));

    let outcome = ctx.editor.create(payload).await?;
    report_save(&outcome)
}
