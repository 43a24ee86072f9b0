use std::collections::HashSet;
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use scribe_core::editor::SaveOutcome;
use scribe_core::models::{parse_tags, Note, NoteId, PendingOperation};
use scribe_core::reconcile::{reconcile, CachePolicy, VersionSource};
use scribe_core::sync::NoteServer;
use serde::Serialize;

use crate::context::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub pending_sync: bool,
}

#[derive(Debug, Serialize)]
pub struct PendingItem {
    pub id: i64,
    pub kind: String,
    pub note_id: String,
    pub title: Option<String>,
    pub queued_at: String,
}

/// Where the displayed copy of a note came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOrigin {
    Server,
    /// Local copy newer than the server's
    UnsyncedLocal,
    /// Server not consulted (offline or unknown to it)
    Cache,
}

#[derive(Debug)]
pub struct LoadedNote {
    pub note: Note,
    pub origin: NoteOrigin,
}

/// Resolve a note id or unique prefix against the local store
pub async fn resolve_note_id(query: &str, ctx: &AppContext) -> Result<NoteId, CliError> {
    let query = normalize_note_identifier(query)?;
    let id = ctx.store().resolve_alias(&NoteId::new(query.clone())).await?;
    if ctx.store().get_note(&id).await?.is_some() {
        return Ok(id);
    }

    let matching_ids = ctx
        .store()
        .all_notes()
        .await?
        .into_iter()
        .map(|note| note.id)
        .filter(|id| id.as_str().starts_with(&query))
        .take(3)
        .collect::<Vec<_>>();

    match matching_ids.as_slice() {
        [] => Ok(id),
        [single] => Ok(single.clone()),
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Load a note for display, reconciling the server copy with the cache
pub async fn load_note(id: &NoteId, ctx: &AppContext) -> Result<LoadedNote, CliError> {
    if ctx.is_online() {
        match ctx.remote().fetch_note(id).await {
            Ok(Some(server)) => {
                let reconciled = reconcile(ctx.store(), server, CachePolicy::Warm).await;
                let origin = match reconciled.source {
                    VersionSource::Server => NoteOrigin::Server,
                    VersionSource::Local => NoteOrigin::UnsyncedLocal,
                };
                return Ok(LoadedNote {
                    note: reconciled.note,
                    origin,
                });
            }
            Ok(None) => tracing::debug!("Server does not know note {id}; using cache"),
            Err(error) => tracing::warn!("Could not fetch note {id}: {error}"),
        }
    }

    ctx.store()
        .get_note(id)
        .await?
        .map(|note| LoadedNote {
            note,
            origin: NoteOrigin::Cache,
        })
        .ok_or_else(|| CliError::NoteNotFound(id.to_string()))
}

/// Note ids with at least one queued change
pub async fn pending_note_ids(ctx: &AppContext) -> Result<HashSet<NoteId>, CliError> {
    let mut ids = HashSet::new();
    for operation in ctx.store().pending_operations().await? {
        ids.insert(ctx.store().resolve_alias(&operation.note_id).await?);
    }
    Ok(ids)
}

/// Print the id and status of a save; a failed local fallback is an error
pub fn report_save(outcome: &SaveOutcome) -> Result<(), CliError> {
    println!("{}  ({})", outcome.id(), outcome.status().label());
    match outcome {
        SaveOutcome::Failed { error, .. } => Err(CliError::SaveFailed(error.clone())),
        _ => Ok(()),
    }
}

pub fn format_note_lines(notes: &[Note], pending: &HashSet<NoteId>) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let marker = if pending.contains(&note.id) { '*' } else { ' ' };
            let title = truncate(&note.title, 30);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            let tags = render_tags(note);

            if tags.is_empty() {
                format!(
                    "{marker}{:<13}  {title:<30}  {relative_time}",
                    short_id(&note.id)
                )
            } else {
                format!(
                    "{marker}{:<13}  {title:<30}  {relative_time:<10}  {tags}",
                    short_id(&note.id)
                )
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note, pending: &HashSet<NoteId>) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        category: note.category.clone(),
        tags: note.tag_names(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
        pending_sync: pending.contains(&note.id),
    }
}

pub fn pending_to_item(operation: &PendingOperation) -> PendingItem {
    PendingItem {
        id: operation.id,
        kind: operation.kind.to_string(),
        note_id: operation.note_id.to_string(),
        title: operation.data.as_ref().map(|data| data.title.clone()),
        queued_at: format_timestamp(operation.timestamp),
    }
}

pub fn format_pending_lines(operations: &[PendingOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let title = operation
                .data
                .as_ref()
                .map(|data| truncate(&data.title, 30))
                .unwrap_or_default();
            format!(
                "{:>4}  {:<6}  {:<13}  {}  {title}",
                operation.id,
                operation.kind,
                short_id(&operation.note_id),
                format_timestamp(operation.timestamp)
            )
        })
        .collect()
}

pub fn short_id(id: &NoteId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.content.lines().next().unwrap_or("").trim();
    truncate(first_line, max_chars)
}

/// Collapse whitespace and cut to `max_chars`, marking the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{}", tag.name))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Tags given as repeated flags, each possibly comma-separated
pub fn collect_tags(raw: &[String]) -> Vec<String> {
    parse_tags(&raw.join(","))
}

/// Title from the first non-empty line of content
pub fn derive_title(content: &str) -> String {
    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    let first_line = first_line.trim_start_matches('#').trim();
    truncate(first_line, 80)
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    env::temp_dir().join(format!("scribe-note-{}-{now}.md", std::process::id()))
}
