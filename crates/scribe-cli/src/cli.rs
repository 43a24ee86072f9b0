use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Offline-first notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalOptions,

    /// Quick capture: scribe "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalOptions {
    /// Optional path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Notes API base URL (overrides config and SCRIBE_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Skip the server entirely; changes are queued locally
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title (defaults to the first line of content)
        #[arg(short, long)]
        title: Option<String>,
        /// Category (no whitespace)
        #[arg(short, long)]
        category: Option<String>,
        /// Tag to attach; repeat or comma-separate for several
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Note content
        content: Vec<String>,
    },
    /// Edit an existing note in $EDITOR
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(short, long)]
        title: Option<String>,
        /// Replace the category
        #[arg(short, long)]
        category: Option<String>,
        /// Replace the tags; repeat or comma-separate for several
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Show a note, preferring unsynced local changes over the server copy
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued changes against the server
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Keep running and replay queued changes whenever the server is reachable
    Watch {
        /// Seconds between connectivity probes
        #[arg(short, long, default_value = "15")]
        interval: u64,
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
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List changes waiting to be replayed
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
