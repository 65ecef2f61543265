use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "camfeed")]
#[command(about = "Live webcam feed synchronizer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the feed service and its status API
    Run(RunArgs),
    /// Fetch one collection and print its normalized descriptors
    Catalog(CatalogArgs),
    /// Print the catalog's current version token
    Probe,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Address to bind the status API to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct CatalogArgs {
    /// Collection name as configured under `[catalog.collections]`
    pub collection: String,
}
