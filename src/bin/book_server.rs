//! HTTP server binary entry point.
//!
//! Loads the artifacts once, fits the neighbor index and serves the
//! recommendation page and JSON API until interrupted.

use anyhow::{Context, Result};
use book_recommender::{
    config::RecommenderConfig,
    server::{self, AppState, ServerConfig},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Book recommendation web server
#[derive(Parser, Debug)]
#[command(
    name = "book_server",
    version,
    about = "Serve book recommendations over HTTP"
)]
struct Args {
    /// Directory holding the artifact files [env: BOOKREC_ARTIFACTS_DIR]
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Bind address [env: BOOKREC_HOST]
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Bind port [env: BOOKREC_PORT]
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory served under /static [env: BOOKREC_STATIC_DIR]
    #[arg(long, value_name = "DIR")]
    static_dir: Option<PathBuf>,

    /// Neighbors per query, the query book included [env: BOOKREC_NEIGHBORS]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    neighbors: Option<u64>,

    /// Retailer base URL for search links [env: BOOKREC_RETAILER_URL]
    #[arg(long, value_name = "URL")]
    retailer_url: Option<String>,

    /// Logging verbosity level
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    log_level: String,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let mut config = RecommenderConfig::from_env();
    if let Some(dir) = args.artifacts {
        config.artifacts_dir = dir;
    }
    if let Some(n) = args.neighbors {
        config.n_neighbors = Some(n as usize);
    }
    if let Some(url) = args.retailer_url {
        config.retailer_url = url;
    }

    let mut server_config = ServerConfig::from_env();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(dir) = args.static_dir {
        server_config.static_dir = dir;
    }

    info!("Starting book recommender v{}", book_recommender::VERSION);
    info!("Loading artifacts from: {}", config.artifacts_dir.display());

    let recommender = config.load_recommender().await.with_context(|| {
        format!(
            "Failed to load artifacts from {}",
            config.artifacts_dir.display()
        )
    })?;

    let state = AppState::new(Arc::new(recommender)).with_context(|| "Failed to build page templates")?;

    server::serve(&server_config, Arc::new(state))
        .await
        .with_context(|| format!("Server on {} failed", server_config.bind_addr()))?;

    Ok(())
}
