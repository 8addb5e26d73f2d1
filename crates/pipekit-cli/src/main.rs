//! pipekit CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod files;

#[derive(Parser)]
#[command(name = "pipekit")]
#[command(about = "Generate GitOps CI/CD bootstrap manifests", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the manifests of a new GitOps repository
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Manage services of a bootstrapped repository
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// Add a service to an environment
    Add(commands::service::AddArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --stdout output stays a clean YAML stream
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Bootstrap(args) => commands::bootstrap::run(args)?,
        Commands::Service { command } => match command {
            ServiceCommands::Add(args) => commands::service::add(args)?,
        },
    }

    Ok(())
}
