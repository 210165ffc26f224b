//! Chatroom server entry point

use chatroom::{ChatroomConfig, ChatroomServer};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    bind_address: Option<String>,

    /// Port
    #[arg(short, long)]
    port: Option<u16>,

    /// Channel joined on login
    #[arg(long)]
    public_channel: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatroom=info,relay_hub=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting chatroom server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => ChatroomConfig::from_file(path)?,
        None => ChatroomConfig::default(),
    };

    // Command line wins over the file
    if let Some(bind_address) = args.bind_address {
        config.bind_address = bind_address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(public_channel) = args.public_channel {
        config.public_channel = public_channel;
    }

    info!("Configuration loaded: {:?}", config);

    let server = ChatroomServer::new(config)?;

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Chatroom server error: {}", e);
                return Err(e.into());
            }
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
    }

    server.shutdown().await?;
    info!("Chatroom server stopped");
    Ok(())
}
