use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Offline-first notebooks from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to settings JSON
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Notebook to work in
    #[arg(long, global = true, value_name = "ID", default_value = "default")]
    pub container: String,

    /// Never contact the remote store
    #[arg(long, global = true)]
    pub offline: bool,

    /// Quick capture: quire "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "add")]
    New {
        /// Title; derived from the first line when omitted
        #[arg(short, long)]
        title: Option<String>,
        /// Tab the note belongs to (defaults to the staple pad)
        #[arg(short, long, value_name = "ID")]
        group: Option<String>,
        /// Note content
        content: Vec<String>,
    },
    /// Create a tab with its own note
    Tab {
        /// Tab name
        name: String,
    },
    /// List notes in the notebook
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Include soft-deleted notes
        #[arg(long)]
        deleted: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace content instead of opening $EDITOR
        #[arg(long)]
        content: Option<String>,
        /// Set the title explicitly
        #[arg(long)]
        title: Option<String>,
    },
    /// Move a note to the trash
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Bring a note back from the trash
    Restore {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Remove a trashed note from this device
    Purge {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Push pending writes to the remote store
    Sync,
    /// Show connectivity and queue depth
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
