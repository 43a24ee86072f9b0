use serde::Serialize;

use crate::commands::common::{
    format_timestamp, load_note, render_tags, resolve_note_id, LoadedNote, NoteOrigin,
};
use crate::context::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ShowItem<'a> {
    #[serde(flatten)]
    note: &'a scribe_core::Note,
    origin: NoteOrigin,
}

pub async fn run_show(ctx: &AppContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = resolve_note_id(id, ctx).await?;
    let loaded = load_note(&id, ctx).await?;

    if as_json {
        let item = ShowItem {
            note: &loaded.note,
            origin: loaded.origin,
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        for line in format_note_detail(&loaded) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_note_detail(loaded: &LoadedNote) -> Vec<String> {
    let note = &loaded.note;
    let mut lines = vec![format!("# {}", note.title)];

    let mut meta = vec![
        format!("id: {}", note.id),
        format!("updated: {}", format_timestamp(note.updated_at)),
    ];
    if let Some(category) = &note.category {
        meta.push(format!("category: {category}"));
    }
    let tags = render_tags(note);
    if !tags.is_empty() {
        meta.push(format!("tags: {tags}"));
    }
    lines.push(meta.join("  "));

    match loaded.origin {
        NoteOrigin::UnsyncedLocal => lines.push("[unsynced local version]".to_string()),
        NoteOrigin::Cache => lines.push("[cached copy, server not consulted]".to_string()),
        NoteOrigin::Server => {}
    }
    if let Some(summary) = &note.summary {
        lines.push(format!("summary: {summary}"));
    }

    lines.push(String::new());
    lines.push(note.content.clone());
    lines
}
