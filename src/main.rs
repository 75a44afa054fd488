#![cfg(not(tarpaulin_include))]

use synapse::{Config, app};

/// Main entry point for the web server
///
/// Reads the configuration from the environment and serves the API until
/// interrupted. `RUST_LOG` controls verbosity and defaults to `info`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    app::run(config).await
}
