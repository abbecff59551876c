use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gxyarchiver: export, purge and bundle retired Galaxy histories
#[derive(Parser, Debug)]
#[command(
    name = "gxyarchiver",
    version,
    about = "Galaxy history archiving CLI",
    long_about = "gxyarchiver exports Galaxy histories, verifies the export and purges\n\
                   the live copy, then bundles the exported files into size-bounded tars.",
    after_help = "EXAMPLES:\n  \
        gxyarchiver archive --history-id 7b3e34c9cfd75e90          Archive one history\n  \
        gxyarchiver archive --history-id-file ids.txt -n 4         Archive a list, 4 at a time\n  \
        gxyarchiver bundle --folder-path /archive                  Bundle once if enough data\n  \
        gxyarchiver bundle --folder-path /archive --continual      Bundle until data runs out\n  \
        gxyarchiver verify --folder-path /archive                  Audit staged exports\n  \
        gxyarchiver stage --folder-path ./archive --count 20       Stage random test exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// URL of the Galaxy API
    #[arg(long, global = true, env = "GALAXY_API_URL")]
    pub api_url: Option<String>,

    /// API key for authentication
    #[arg(long, global = true, env = "GALAXY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Config file (defaults to ~/.gxyarchiver/config.toml)
    #[arg(long, global = true, env = "GXYARCHIVER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode: minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive a specific history or list of histories
    Archive {
        /// ID of the history to be archived
        #[arg(long, conflicts_with = "history_id_file")]
        history_id: Option<String>,

        /// File with one history id per line
        #[arg(long, value_name = "PATH")]
        history_id_file: Option<PathBuf>,

        /// Number of histories archived concurrently
        #[arg(long, short = 'n', default_value_t = 1)]
        num_concurrent: usize,

        /// Continue with remaining histories after an error (default)
        #[arg(long, overrides_with = "no_ignore_errors")]
        ignore_errors: bool,

        /// Stop the batch at the first error
        #[arg(long, overrides_with = "ignore_errors")]
        no_ignore_errors: bool,
    },

    /// Bundle exported files into tars once there is enough data
    Bundle {
        /// Base archive directory holding 'export', 'bundled' and 'manifest'
        #[arg(long, value_name = "PATH")]
        folder_path: PathBuf,

        /// Bundle size budget in GB
        #[arg(long, env = "DEFAULT_TAR_SIZE_GB")]
        required_size_gb: Option<f64>,

        /// Keep bundling until there are not enough files left
        #[arg(long)]
        continual: bool,

        /// Move unarchived exports to 'quarantine' under the folder path
        #[arg(long)]
        quarantine: bool,

        /// Leave bundled source files in place
        #[arg(long)]
        keep_sources: bool,

        /// Write a plain, uncompressed tar
        #[arg(long)]
        no_compress: bool,
    },

    /// Check that staged exports are archived and purged on the server
    Verify {
        /// Base archive directory holding 'export'
        #[arg(long, value_name = "PATH")]
        folder_path: PathBuf,

        /// Move unarchived exports to this directory
        #[arg(long, value_name = "PATH")]
        quarantine_path: Option<PathBuf>,
    },

    /// Stage random export files for testing
    Stage {
        /// Base archive directory; files go to its 'export' dir
        #[arg(long, value_name = "PATH")]
        folder_path: PathBuf,

        /// Number of files to create
        #[arg(long, default_value_t = 20)]
        count: usize,

        /// Minimum file size in bytes
        #[arg(long, default_value_t = 1024 * 1024)]
        min_size: u64,

        /// Maximum file size in bytes
        #[arg(long, default_value_t = 4 * 1024 * 1024)]
        max_size: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write the default configuration file
    Init,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
