use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use qrstash::qr::ErrorCorrection;

#[derive(Parser, Debug)]
#[command(name = "qrstash")]
#[command(about = "QR code generation service with Azure Blob persistence", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Render a QR code to a local PNG file (no cloud access)
    Render(RenderArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Text to encode
    pub url: String,

    #[arg(short, long, default_value = "qr.png")]
    pub output: PathBuf,

    /// Pixels per module
    #[arg(long, default_value_t = 10)]
    pub module_size: u32,

    /// Quiet zone width in modules
    #[arg(long, default_value_t = 4)]
    pub border: u32,

    /// Error-correction level: L, M, Q or H
    #[arg(long, default_value = "L")]
    pub ec_level: ErrorCorrection,
}
