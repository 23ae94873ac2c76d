use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use nbusync::config::AppConfig;
use nbusync::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP trigger server (the default)
    Serve,
    /// Sync a date range once and print the JSON summary
    Sync {
        /// First day to sync (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to sync (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Verify store connectivity and write the sheet header
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = AppConfig::from_env()?;

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => nbusync::run_server(config).await,
        Commands::Sync { from, to } => {
            let today = Utc::now().date_naive();
            let summary = nbusync::run_sync_once(
                config,
                from.unwrap_or(today),
                to.unwrap_or(today),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Setup => nbusync::run_setup(config).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
