use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ncp::{Server, TcpImp};

use crate::config::Config;

mod config;

#[derive(Debug, Parser)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/ncpd.toml")]
    config: PathBuf,

    /// Enables verbose output on STDERR
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(match cli.verbose {
            true => tracing::Level::TRACE,
            false => tracing::Level::INFO,
        })
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_file(cli.config)?;

    let path = std::env::var_os("NCP")
        .map(PathBuf::from)
        .or(config.socket_path)
        .context("No application socket path: set $NCP or socket_path in the config")?;

    let driver = TcpImp::connect(config.imp_addr.as_str(), config.connect_timeout)
        .await
        .with_context(|| format!("Connecting to the IMP at {}", config.imp_addr))?;

    let mut server = Server::new(driver, path);
    Ok(server.run().await?)
}
