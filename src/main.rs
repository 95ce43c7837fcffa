mod cli;

use clap::Parser;
use cli::{Cli, Commands, RenderArgs};
use qrstash::api::{self, StartupError};
use qrstash::config::Config;
use qrstash::qr::{self, QrOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            info!("Loading configuration");
            let mut config = Config::load().map_err(StartupError::from)?;
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            api::run(config).await?
        }
        Commands::Render(args) => render(args)?,
    }

    Ok(())
}

fn render(args: RenderArgs) -> Result<(), AnyError> {
    let options = QrOptions::builder()
        .ec_level(args.ec_level)
        .module_size(args.module_size)
        .border(args.border)
        .build();

    let png = qr::encode_png(&args.url, &options)?;
    std::fs::write(&args.output, &png)?;

    info!(path = %args.output.display(), bytes = png.len(), ec_level = %options.ec_level, "QR code written");
    Ok(())
}
