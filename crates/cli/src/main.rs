// RosterLink CLI - schema correspondence and three-source roster merge

mod cache;
mod exit_codes;
mod merge;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rosterlink_merge::MergeError;

use exit_codes::{merge_exit_code, EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "rosterlink")]
#[command(about = "Merge rosters whose columns are laid out differently")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). ROSTERLINK_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the three sources named in a merge config into one roster
    #[command(after_help = "\
Examples:
  rosterlink merge winter-break.merge.toml
  rosterlink merge winter-break.merge.toml -o out/roster.xlsx
  rosterlink merge winter-break.merge.toml --json > report.json

Exit codes:
  0  Success
  2  Bad arguments or invalid config
  3  A source could not be read
  4  Classification service unavailable and no cached mapping
  5  No usable correspondence (or no natural key correspondence)
  6  Duplicate natural key (duplicate_keys = \"reject\")
  7  Output could not be written")]
    Merge {
        /// Merge config (*.merge.toml)
        config: PathBuf,

        /// Output file (.xlsx or .csv); default is <output.dir>/<prefix>_<timestamp>.xlsx
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Ignore the correspondence cache for this run
        #[arg(long)]
        no_cache: bool,

        /// Print the merge report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Resolve and print the column correspondences for one pair of sources
    #[command(after_help = "\
Examples:
  rosterlink compare winter-break.merge.toml --pair 1_to_2
  rosterlink compare winter-break.merge.toml --pair 1_to_3 --raw")]
    Compare {
        /// Merge config (*.merge.toml)
        config: PathBuf,

        /// Source pair: 1_to_2, 1_to_3 or 2_to_3
        #[arg(long, default_value = "1_to_2")]
        pair: String,

        /// Print the classification service's answer verbatim
        #[arg(long)]
        raw: bool,

        /// Do not consult or update the correspondence cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the header labels of a spreadsheet or CSV file
    Headers {
        file: PathBuf,

        /// Spreadsheet row number (1-based) holding the headers
        #[arg(long, default_value = "1")]
        header_row: usize,

        /// Sheet name for multi-sheet files
        #[arg(long)]
        sheet: Option<String>,

        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the correspondence cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// AI provider commands
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached header-set pairs
    Show {
        /// Cache file (default: from settings)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Remove every cached mapping
    Clear {
        /// Cache file (default: from settings)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Diagnose AI configuration
    #[command(after_help = "\
Exit codes:
  0   AI configured and ready
  10  AI disabled (provider=none)
  11  API key missing")]
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\ncommit: ",
        env!("GIT_COMMIT_HASH"),
        "\ntarget: ",
        env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("ROSTERLINK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            eprintln!("Usage: rosterlink <command> [options]");
            eprintln!("       rosterlink --help for more information");
            Ok(())
        }
        Some(Commands::Merge { config, output, no_cache, json }) => {
            merge::cmd_merge(config, output, no_cache, json)
        }
        Some(Commands::Compare { config, pair, raw, no_cache }) => {
            merge::cmd_compare(config, pair, raw, no_cache)
        }
        Some(Commands::Headers { file, header_row, sheet, json }) => cmd_headers(file, header_row, sheet, json),
        Some(Commands::Cache(cmd)) => match cmd {
            CacheCommands::Show { path, json } => cache::cmd_cache_show(path, json),
            CacheCommands::Clear { path } => cache::cmd_cache_clear(path),
        },
        Some(Commands::Ai { command }) => match command {
            AiCommands::Doctor { json } => cmd_ai_doctor(json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from a merge failure with its registered exit code.
    pub fn merge(err: MergeError) -> Self {
        let code = merge_exit_code(&err);
        let hint = match &err {
            MergeError::OracleUnavailable { .. } => {
                Some("run `rosterlink ai doctor` to check the classification service".to_string())
            }
            MergeError::MappingUnresolved { .. } => {
                Some("check the header rows in the merge config; `rosterlink compare --raw` shows the answer".to_string())
            }
            MergeError::DuplicateKey { .. } => {
                Some("set [join] duplicate_keys = \"last_write_wins\" to let the last row win".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// headers
// ============================================================================

fn cmd_headers(file: PathBuf, header_row: usize, sheet: Option<String>, json: bool) -> Result<(), CliError> {
    if header_row == 0 {
        return Err(CliError::args("--header-row is 1-based"));
    }
    rosterlink_io::FileKind::from_path(&file).map_err(CliError::args)?;

    let headers = rosterlink_io::extract_headers(&file, header_row - 1, sheet.as_deref()).ok_or_else(|| CliError {
        code: exit_codes::EXIT_MERGE_EXTRACTION,
        message: format!("no header labels on row {header_row} of {}", file.display()),
        hint: Some("use --header-row to point at the row holding the labels".to_string()),
    })?;

    if json {
        let out = serde_json::to_string(&headers)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        for (i, h) in headers.iter().enumerate() {
            println!("{:>3}  {}", i + 1, h);
        }
    }
    Ok(())
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(json: bool) -> Result<(), CliError> {
    use rosterlink_config::ai::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig};

    let config = ResolvedAIConfig::load();
    let diag = AIDiagnostics::from_resolved(&config);

    if json {
        let out = serde_json::to_string_pretty(&diag)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        println!("{diag}");
    }

    // Exit code carries the status; the report above already explains it.
    match config.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError { code: EXIT_AI_DISABLED, message: String::new(), hint: None }),
        AIConfigStatus::MissingKey => Err(CliError { code: EXIT_AI_MISSING_KEY, message: String::new(), hint: None }),
    }
}
