use crate::commands::common::{report_save, resolve_note_id};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let id = resolve_note_id(id, ctx).await?;
    let outcome = ctx.editor.delete(id).await?;
    report_save(&outcome)
}
