mod brand;
mod scrape;

use clap::{Parser, Subcommand};
use shelfscan_scraper::CancelFlag;
use tracing_subscriber::EnvFilter;

use crate::scrape::ScrapeArgs;

#[derive(Debug, Parser)]
#[command(name = "shelfscan")]
#[command(about = "Extract product listings and brand profiles from websites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape a paginated product listing into CSV and/or JSON
    Scrape(ScrapeArgs),
    /// Build a brand profile from a website's landing page
    Brand {
        /// Landing page URL (scheme optional)
        url: String,

        /// Write the profile as JSON to this file instead of stdout
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = shelfscan_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Scrape(args) => {
            args.apply_to(&mut config);
            for warning in config.validate() {
                tracing::warn!("{warning}");
            }
            let cancel = CancelFlag::new();
            spawn_ctrl_c_handler(cancel.clone());
            scrape::run_scrape(&config, &args, &cancel).await
        }
        Commands::Brand { url, output } => brand::run_brand(&config, &url, output.as_deref()).await,
    }
}

/// Cancels the run on the first Ctrl-C; the current page finishes first.
fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received Ctrl-C, stopping after the current page");
            cancel.cancel();
        }
    });
}
