use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quire_core::config::SyncSettings;
use quire_core::remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
use quire_core::{ContainerId, LocalStore, Note, RecordId, SyncService};
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs to reach the store
pub struct AppContext {
    pub db_path: PathBuf,
    pub settings: SyncSettings,
    pub container: ContainerId,
}

impl AppContext {
    pub fn load(
        db_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
        container: &str,
        force_offline: bool,
    ) -> Result<Self, CliError> {
        let config_path = config_path
            .or_else(|| env::var_os("QUIRE_CONFIG").map(PathBuf::from))
            .unwrap_or_else(default_config_path);
        let mut settings = SyncSettings::load(&config_path)?.with_env()?;
        if force_offline {
            settings.offline = true;
        }

        Ok(Self {
            db_path: resolve_db_path(db_path),
            settings,
            container: ContainerId::new(container.trim()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub temporary: bool,
    pub title: String,
    pub preview: String,
    pub group_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
    pub relative_time: String,
}

/// Open the sync service for one command invocation.
///
/// Without a configured remote the service runs local-only: the gate starts
/// offline and every write stays queued.
pub async fn open_service(ctx: &AppContext) -> Result<SyncService, CliError> {
    let local = LocalStore::open_path(&ctx.db_path)?;
    let remote: Arc<dyn RemoteStore> = match ctx.settings.remote_url.as_deref() {
        Some(url) => Arc::new(HttpRemoteStore::new(
            url,
            ctx.settings.auth_token.clone(),
            ctx.settings.remote_timeout(),
        )?),
        None => {
            let detached = MemoryRemoteStore::new();
            detached.set_reachable(false);
            Arc::new(detached)
        }
    };

    let service = SyncService::from_settings(local, remote, &ctx.settings);
    tracing::debug!(
        online = service.is_online(),
        pending = service.pending_count().await?,
        "Opened {}",
        ctx.db_path.display()
    );
    Ok(service)
}

/// Push whatever a command queued, when the remote is reachable.
pub async fn drain_if_online(service: &SyncService) -> Result<(), CliError> {
    if let Some(report) = service.drain_now().await? {
        if report.failed > 0 {
            tracing::warn!("{} write(s) stay queued for retry", report.failed);
        }
    }
    Ok(())
}

pub async fn resolve_note(note_query: &str, service: &SyncService) -> Result<Note, CliError> {
    if let Ok(id) = note_query.parse::<RecordId>() {
        if let Some(note) = service.get_note(&id).await? {
            return Ok(note);
        }
    }

    let mut matching = service
        .local()
        .get_all()
        .await?
        .into_iter()
        .filter(|note| note.id.as_str().starts_with(note_query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(note_query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &RecordId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let marker = match (note.id.is_temporary(), note.is_deleted()) {
                (_, true) => "x",
                (true, false) => "*",
                (false, false) => " ",
            };
            let title = truncate(&note.title, 24);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!(
                "{marker} {:<13}  {title:<24}  {preview:<40}  {relative_time}",
                short_id(&note.id)
            )
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        temporary: note.id.is_temporary(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        group_id: note.group_id.to_string(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        deleted_at: note.deleted_at,
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.plain_text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, max_chars)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
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

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
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

fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quire-note-{}-{now}.txt", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("QUIRE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quire")
        .join("quire.db")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quire")
        .join("settings.json")
}
