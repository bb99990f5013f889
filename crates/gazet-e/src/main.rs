use anyhow::Context;
use clap::Parser;
use gazet_e::backend::WebDriverFactory;
use gazet_engine::cli::{self, Command, OutputHandlers};
use gazet_engine::config::ConfigLoader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gazet-e", version, about = "Cascading dropdown harvester over WebDriver")]
struct Args {
    /// Configuration file (default: ./gazet.yaml, then ~/.gazet/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// WebDriver endpoint (falls back to browser.driver_url, then localhost:4444)
    #[arg(long, global = true)]
    driver_url: Option<String>,

    /// Ask the driver for a visible window
    #[arg(long, global = true)]
    visible: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

const DEFAULT_DRIVER_URL: &str = "http://localhost:4444";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let url = args
        .driver_url
        .or_else(|| config.browser.driver_url.clone())
        .unwrap_or_else(|| DEFAULT_DRIVER_URL.to_string());

    let factory = WebDriverFactory::new(url, args.visible || config.browser.visible);
    let output = OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    };
    cli::run_command(&factory, &config.cascade, args.command, output).await?;
    Ok(())
}
