mod adm;
mod dbopt;
mod leaderboard;
mod models;
mod schema;
mod series;
mod server;
mod tagging;
mod voting;

use crate::adm::result::Error;
use crate::adm::{stats, tags};
use crate::dbopt::DbOpt;
use clap::Parser;
use dotenv::dotenv;
use std::process::exit;
use tracing_subscriber::EnvFilter;

/// Command line interface for spacegallery.
#[derive(Parser)]
#[clap(about, version)]
enum SpaceGallery {
    /// Show some statistics from the database.
    Stats(DbOpt),
    /// Manage the tags users classify images with.
    Tag(tags::Tags),
    /// Run the spacegallery web server.
    Runserver(server::Args),
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    match run(&SpaceGallery::parse()).await {
        Ok(()) => (),
        Err(err) => {
            println!("{err}");
            exit(1);
        }
    }
}

async fn run(args: &SpaceGallery) -> Result<(), Error> {
    match args {
        SpaceGallery::Stats(db) => {
            stats::show_stats(&mut db.connect().await?).await
        }
        SpaceGallery::Tag(cmd) => cmd.run().await,
        SpaceGallery::Runserver(args) => server::run(args).await,
    }
}

include!(concat!(env!("OUT_DIR"), "/templates.rs"));
