mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// todoflow - event-driven todo platform
#[derive(Parser)]
#[command(name = "todoflow")]
#[command(about = "Event-driven todo platform services", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start one of the platform services
    Serve {
        /// Which service to run
        service: cli::Service,

        /// Server host address (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run database migrations for the command and audit databases
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = todoflow::config::Config::load(cli.config.as_deref())?;

    let env_filter = EnvFilter::new(&config.monitoring.log_level);
    if config.monitoring.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
            .try_init()?;
    }

    match cli.command {
        Commands::Serve {
            service,
            host,
            port,
        } => crate::cli::serve(config, service, host, port).await,
        Commands::Migrate => crate::cli::migrate(config).await,
    }
}
