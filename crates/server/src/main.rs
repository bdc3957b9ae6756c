use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "wayfarer-server", about = "Local companion server for the Wayfarer expedition tracker")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1:39777")]
    addr: SocketAddr,

    /// SQLite store path. Defaults to ~/.wayfarer/wayfarer.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Expedition catalog YAML.
    #[arg(long, default_value = "expeditions.yaml")]
    catalog: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let db_path = args.db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wayfarer")
            .join("wayfarer.db")
    });

    tracing::info!(addr = %args.addr, db = %db_path.display(), "wayfarer server listening");
    wayfarer_server::serve(args.addr, db_path, args.catalog).await
}
