use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deckbooth")]
#[command(author, version, about)]
#[command(long_about = "A fullscreen kiosk menu for slide-deck presentations.\n\n\
    Point it at a directory of decks and it shows a touch-friendly menu\n\
    with a thumbnail picker, launching each deck in the system's\n\
    presentation program.\n\n\
    Examples:\n  \
    deckbooth /srv/decks             Run the kiosk (fullscreen)\n  \
    deckbooth /srv/decks --windowed  Run in a window\n  \
    deckbooth cache status           Inspect the thumbnail cache\n  \
    deckbooth config init            Write a default config file")]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Directory containing the slide decks to offer
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Launch in a window instead of fullscreen
    #[arg(long, global = false)]
    pub windowed: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or rebuild the thumbnail cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Create or locate the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show the cache state for each deck in the directory
    Status {
        /// Deck directory (falls back to the configured decks_dir)
        dir: Option<PathBuf>,
    },

    /// Regenerate every thumbnail, ignoring the existing cache
    Rebuild {
        /// Deck directory (falls back to the configured decks_dir)
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default config file to edit
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }
        match self.command {
            Some(Commands::Cache { command }) => match command {
                CacheCommands::Status { dir } => crate::commands::cache::status(dir),
                CacheCommands::Rebuild { dir } => crate::commands::cache::rebuild(dir),
            },
            Some(Commands::Config { command }) => match command {
                ConfigCommands::Init { force } => crate::commands::config::init(force),
                ConfigCommands::Path => crate::commands::config::path(),
            },
            Some(Commands::Completion { shell }) => {
                crate::commands::completion::run(shell);
                Ok(())
            }
            Some(Commands::Version) => {
                println!("deckbooth {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            None => crate::app::run(self.dir, self.windowed),
        }
    }
}
