mod cli;

use clap::Parser;
use cli::{Cli, Commands};

use camfeed::config::Config;
use camfeed::service::FeedService;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    camfeed::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => camfeed::api::run(args.address).await?,
        Commands::Catalog(args) => {
            let service = FeedService::from_config(&Config::load()?)?;
            let descriptors = service.fetcher().fetch_catalog(&args.collection).await?;
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
        }
        Commands::Probe => {
            let service = FeedService::from_config(&Config::load()?)?;
            let token = service.probe_version().await?;
            println!("{token} ({:?})", token.source);
        }
    }

    Ok(())
}
