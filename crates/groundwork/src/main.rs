mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ground")]
#[command(about = "Declarative provisioning and deployment for the tracking-server stack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan {
        /// Stack file path
        #[arg(short = 'f', long, default_value = "stack.kdl", env = "GROUNDWORK_FILE")]
        file: PathBuf,
        /// State directory (default: .groundwork beside the stack file)
        #[arg(long)]
        state_dir: Option<PathBuf>,
        /// Include Delete actions for orphaned resources
        #[arg(long)]
        prune: bool,
    },
    /// Apply the stack in dependency order
    Apply {
        /// Stack file path
        #[arg(short = 'f', long, default_value = "stack.kdl", env = "GROUNDWORK_FILE")]
        file: PathBuf,
        /// State directory (default: .groundwork beside the stack file)
        #[arg(long)]
        state_dir: Option<PathBuf>,
        /// Also delete orphaned resources
        #[arg(long)]
        prune: bool,
        /// Apply without confirmation
        #[arg(short, long)]
        yes: bool,
        /// Attempts per resource for transient provider errors
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        /// Initial backoff delay in milliseconds
        #[arg(long, default_value_t = 1000)]
        base_delay_ms: u64,
        /// Backoff ceiling in milliseconds
        #[arg(long, default_value_t = 30000)]
        max_delay_ms: u64,
    },
    /// Delete everything recorded as applied, dependents first
    Destroy {
        /// Stack file path
        #[arg(short = 'f', long, default_value = "stack.kdl", env = "GROUNDWORK_FILE")]
        file: PathBuf,
        /// State directory (default: .groundwork beside the stack file)
        #[arg(long)]
        state_dir: Option<PathBuf>,
        /// Destroy without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Check the stack file and provider authentication
    Validate {
        /// Stack file path
        #[arg(short = 'f', long, default_value = "stack.kdl", env = "GROUNDWORK_FILE")]
        file: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("groundwork {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let code = match cli.command {
        Commands::Plan {
            file,
            state_dir,
            prune,
        } => commands::plan::handle(&file, state_dir, prune).await?,
        Commands::Apply {
            file,
            state_dir,
            prune,
            yes,
            max_retries,
            base_delay_ms,
            max_delay_ms,
        } => {
            let retry = groundwork_cloud::RetryConfig {
                max_attempts: max_retries,
                initial_delay_ms: base_delay_ms,
                max_delay_ms,
                multiplier: 2.0,
            };
            commands::apply::handle(&file, state_dir, prune, yes, retry).await?
        }
        Commands::Destroy {
            file,
            state_dir,
            yes,
        } => commands::destroy::handle(&file, state_dir, yes).await?,
        Commands::Validate { file } => commands::validate::handle(&file).await?,
        Commands::Version => unreachable!("Version is handled above"),
    };

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
