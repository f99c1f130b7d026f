mod app;
mod commands;
mod config;
mod db;
mod discord;
mod error;
mod format;
mod models;
mod sweep;

use app::App;
use config::{Config, TOKEN_ENV};
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    if config.discord_token.is_none() {
        eprintln!("Error: {} not found in environment variables.", TOKEN_ENV);
        eprintln!("Please create a .env file with your Discord bot token:");
        eprintln!("{}=your_bot_token_here", TOKEN_ENV);
        std::process::exit(1);
    }

    let app = App::new(config).await?;
    app.run().await
}
