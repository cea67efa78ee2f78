use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dotman::{
    commands,
    paths::StorageLayout,
    profiles::ProfileManager,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "dotman")]
#[command(about = "Dotfile manager - move ~/.config directories into named configs and switch between them")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_enum, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Log every move (overrides DOTMAN_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Home directory holding .dotman/ (defaults to $HOME)
    #[arg(long, global = true, env = "DOTMAN_HOME", value_name = "DIR")]
    home: Option<PathBuf>,

    /// Live configuration directory (defaults to <home>/.config)
    #[arg(long, global = true, env = "DOTMAN_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configs
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create a new, empty config
    Create {
        /// Name of the config to create
        name: String,
    },

    /// Move directories from the config directory into a config
    Add {
        /// Config that takes ownership of the directories
        config: String,

        /// Directory names inside the config directory (e.g. nvim kitty)
        #[arg(required = true)]
        dirs: Vec<String>,
    },

    /// Activate a config (load its directories into the config directory)
    Use {
        /// Name of the config to activate
        name: String,

        /// Switch away from the active config without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Move a config's directories back into storage
    Deactivate {
        /// Config to deactivate (defaults to the active one)
        name: Option<String>,
    },

    /// List tracked directories per config
    Tracked {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List directories in the config directory and who tracks them
    Dirs {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the active config and storage locations
    Status,

    /// Run diagnostics on the dotman setup
    Doctor,

    /// Interactive menu (default when no command is given)
    Menu,

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dotman=debug")
    } else {
        EnvFilter::try_from_env("DOTMAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Logs go to stderr so --json output stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "dotman", &mut std::io::stdout());
        return Ok(());
    }

    let layout = StorageLayout::resolve(cli.home, cli.config_dir)?;
    tracing::debug!(?layout, "resolved storage layout");
    let pm = ProfileManager::new(layout);
    let ui = Ui::new(cli.color, cli.no_color);

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::List { json } => commands::list(&pm, &ui, json),
        Commands::Create { name } => commands::create(&pm, &name, &ui),
        Commands::Add { config, dirs } => commands::add(&pm, &config, &dirs, &ui),
        Commands::Use { name, yes } => commands::use_profile(&pm, &name, &ui, yes),
        Commands::Deactivate { name } => commands::deactivate(&pm, name.as_deref(), &ui),
        Commands::Tracked { json } => commands::tracked(&pm, &ui, json),
        Commands::Dirs { json } => commands::dirs(&pm, &ui, json),
        Commands::Status => commands::status(&pm, &ui),
        Commands::Doctor => commands::doctor(&pm, &ui),
        Commands::Menu => commands::menu(&pm, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
