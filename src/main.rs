use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "pocer")]
#[command(version, about = "AI-driven smart contract exploit PoC generator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Foundry project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, exploit and test every target until the exploit lands
    Run {
        /// Single contract to target (the .sol suffix is optional)
        #[arg(short, long)]
        file: Option<String>,

        /// Attempt cycles per target. Overrides pocer.toml.
        #[arg(short = 'n', long)]
        attempts: Option<u32>,

        /// Stop the batch at the first target that cannot be attributed
        #[arg(long)]
        fail_fast: bool,
    },
    /// List the targets a run would process
    List,
    /// Show per-target progress from the state file
    Status,
    /// Clear recorded state and logs
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default pocer.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            file,
            attempts,
            fail_fast,
        } => {
            let succeeded =
                cmd::run_batch(&cli, project_dir, file.as_deref(), *attempts, *fail_fast).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::List => cmd::cmd_list(&project_dir)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&project_dir, &cli, *force)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
