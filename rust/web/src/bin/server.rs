//! Standalone room server binary
//!
//! Usage: cargo run -p pokeroom_web --bin pokeroom-server -- --port 8080

use clap::Parser;
use pokeroom_web::{AppSettings, SettingsOverrides, WebServer};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pokeroom-server", version, about = "Authoritative poker room server")]
struct Args {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,
    /// Port to bind to
    #[arg(long, short = 'p')]
    port: Option<u16>,
    /// TOML settings file (overrides POKEROOM_CONFIG)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    pokeroom_web::init_logging(args.json_logs)?;

    let flags = SettingsOverrides {
        host: args.host,
        port: args.port,
        config: args.config,
    };
    let resolved = AppSettings::load(&flags)?;
    let settings = &resolved.settings;
    tracing::info!(
        host = %settings.host,
        port = settings.port,
        small_blind = settings.small_blind,
        big_blind = settings.big_blind,
        max_seats = settings.max_seats,
        action_timeout_secs = ?settings.action_timeout_secs,
        config_file = ?resolved.file,
        "starting pokeroom server"
    );

    let server = WebServer::new(settings.server_config())?;
    let handle = server.start().await?;
    println!("Server running at http://{}", handle.address());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
