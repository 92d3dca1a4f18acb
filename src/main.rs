use anyhow::Result;
use clap::Parser;
use modpm::commands::{self, ModSpec};
use modpm::config::Config;
use modpm::progress::ConsoleProgress;
use std::path::PathBuf;
use std::sync::Arc;

/// modpm - mod package manager
///
/// Installs mods and their dependencies from registered sources into the
/// `mods` directory of a game.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// This is useful for avoiding the GitHub rate limit.
///
/// Examples:
///   modpm add-source https://github.com/owner/repo
///   modpm install Bags@1.2.0
#[derive(Parser, Debug)]
#[command(author, version = env!("MODPM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Game directory holding `mods` and `mod-installer` (defaults to the current directory)
    #[arg(
        long = "root",
        short = 'r',
        env = "MODPM_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Base URL for raw repository files (defaults to https://raw.githubusercontent.com)
    #[arg(long = "raw-url", value_name = "URL", global = true, hide = true)]
    pub raw_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Register a source: a GitHub repository, a description URL or file
    AddSource(AddSourceArgs),

    /// Reload all registered sources
    Refresh(RefreshArgs),

    /// List installed mods
    List,

    /// Show the latest version of available mods
    Search(SearchArgs),

    /// Show what installing a mod would change
    Plan(ModArgs),

    /// Install a mod and its dependencies
    Install(ModArgs),

    /// Uninstall all versions of a mod
    Uninstall(UninstallArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddSourceArgs {
    #[arg(value_name = "DEFINITION")]
    pub definition: String,
}

#[derive(clap::Args, Debug)]
pub struct RefreshArgs {
    /// Download sources even if they did not change
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Part of the mod name, case insensitive
    #[arg(value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ModArgs {
    /// The mod, optionally with a version; the latest version otherwise
    #[arg(value_name = "NAME[@VERSION]")]
    pub spec: ModSpec,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = modpm::runtime::RealRuntime;

    let config = Config::new(&runtime, cli.root, cli.api_url, cli.raw_url)?;
    let mut installer = commands::open(runtime, &config, Arc::new(ConsoleProgress::stderr()))?;
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::AddSource(args) => {
            commands::add_source(&mut installer, &args.definition).await?
        }
        Commands::Refresh(args) => commands::refresh(&mut installer, args.force).await?,
        Commands::List => commands::list(&installer, &mut stdout)?,
        Commands::Search(args) => {
            commands::search(&installer, args.name.as_deref(), &mut stdout)?
        }
        Commands::Plan(args) => commands::plan(&installer, &args.spec, &mut stdout)?,
        Commands::Install(args) => commands::install(&mut installer, &args.spec).await?,
        Commands::Uninstall(args) => commands::uninstall(&mut installer, &args.name)?,
    }
    Ok(())
}
