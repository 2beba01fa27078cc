use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::debug;

use mdnav::config::Config;
use mdnav::error::Error;
use mdnav::{browse, commands, diagnostics, info};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "mdnav", version, about = "Resolve, fetch, and navigate markdown documents")]
struct Cli {
    /// What to do.
    #[command(subcommand)]
    command: Commands,
    /// Config file (default: $XDG_CONFIG_HOME/mdnav/config.toml)
    #[arg(long, global = true, env = "MDNAV_CONFIG")]
    config: Option<PathBuf>,
    /// More logging; repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

/// Top-level commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage bookmarks
    Bookmarks {
        /// Bookmark operation.
        #[command(subcommand)]
        action: BookmarkAction,
    },
    /// Interactive session; reopens the last location when no address is given
    Browse {
        /// Address to open first
        address: Vec<String>,
    },
    /// Expand forge shorthand (e.g. `gh owner/repo/docs/a.md`) to a raw URL
    Expand {
        /// Forge shorthand
        #[arg(required = true)]
        shorthand: Vec<String>,
    },
    /// Manage saved history
    History {
        /// History operation.
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Print reference documentation for humans and agents
    Info {
        /// Emit JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// List markdown files under a directory
    Local {
        /// Directory to search
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Show how input is classified, without fetching
    Resolve {
        /// Base document for relative links
        #[arg(long)]
        from: Option<String>,
        /// Input to classify
        #[arg(required = true)]
        input: Vec<String>,
    },
    /// Print a document's headings and anchor ids
    Toc {
        /// Document address
        #[arg(required = true)]
        address: Vec<String>,
    },
    /// Print a document
    View {
        /// Document address
        #[arg(required = true)]
        address: Vec<String>,
        /// Print the table of contents first
        #[arg(long)]
        toc: bool,
    },
}

/// `bookmarks` subcommands.
#[derive(Subcommand)]
enum BookmarkAction {
    /// Bookmark an address
    Add {
        /// Address to bookmark
        #[arg(required = true)]
        address: Vec<String>,
        /// Title (default: the file name)
        #[arg(long)]
        title: Option<String>,
    },
    /// List bookmarks
    List,
    /// Move a bookmark to a position
    Move {
        /// Bookmarked address
        #[arg(required = true)]
        address: Vec<String>,
        /// New zero-based position
        #[arg(long)]
        to: usize,
    },
    /// Remove a bookmark
    Remove {
        /// Bookmarked address
        #[arg(required = true)]
        address: Vec<String>,
    },
    /// Retitle a bookmark
    Rename {
        /// Bookmarked address
        #[arg(required = true)]
        address: Vec<String>,
        /// New title
        #[arg(long)]
        title: String,
    },
}

/// `history` subcommands.
#[derive(Subcommand)]
enum HistoryAction {
    /// Forget all history
    Clear,
    /// List saved history, oldest first
    List,
    /// Remove one entry by index
    Remove {
        /// Index shown by `history list`
        index: usize,
    },
}

/// Log level for a `-v` count, unless `RUST_LOG` says otherwise.
const fn default_filter(verbose: u8) -> &'static str {
    return match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
}

/// Route a parsed command to its handler.
///
/// # Errors
///
/// Returns whatever the handler returns.
fn dispatch(command: Commands, config: &Config, config_path: Option<&Path>) -> Result<(), Error> {
    return match command {
        Commands::Bookmarks { action } => match action {
            BookmarkAction::Add { address, title } => commands::bookmark_add(config, &address.join(" "), title.as_deref()),
            BookmarkAction::List => commands::bookmark_list(config),
            BookmarkAction::Move { address, to } => commands::bookmark_move(config, &address.join(" "), to),
            BookmarkAction::Remove { address } => commands::bookmark_remove(config, &address.join(" ")),
            BookmarkAction::Rename { address, title } => commands::bookmark_rename(config, &address.join(" "), &title),
        },
        Commands::Browse { address } => {
            let address = (!address.is_empty()).then(|| return address.join(" "));
            browse::run(config, address.as_deref())
        },
        Commands::Expand { shorthand } => commands::expand(config, &shorthand.join(" ")),
        Commands::History { action } => match action {
            HistoryAction::Clear => commands::history_clear(config),
            HistoryAction::List => commands::history_list(config),
            HistoryAction::Remove { index } => commands::history_remove(config, index),
        },
        Commands::Info { json } => {
            info::run(config, config_path, json);
            Ok(())
        },
        Commands::Local { dir } => commands::local(config, &dir),
        Commands::Resolve { from, input } => commands::resolve(&input.join(" "), from.as_deref()),
        Commands::Toc { address } => commands::toc(config, &address.join(" ")),
        Commands::View { address, toc } => commands::view(config, &address.join(" "), toc),
    };
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter(cli.verbose)))
        .format_timestamp(None)
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            diagnostics::print_error(&e);
            return ExitCode::FAILURE;
        },
    };
    debug!("effective config: {config:?}");

    return match dispatch(cli.command, &config, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    };
}
