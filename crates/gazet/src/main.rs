use anyhow::Context;
use clap::Parser;
use gazet_e::backend::WebDriverFactory;
use gazet_engine::cli::{self, Command, OutputHandlers};
use gazet_engine::config::ConfigLoader;
use gazet_engine::page::PageFactory;
use gazet_h::backend::HeadlessFactory;
use gazet_h::cdp::LaunchOptions;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gazet", version, about = "Gazet unified CLI")]
struct Args {
    /// Configuration file (default: ./gazet.yaml, then ~/.gazet/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Drive an existing WebDriver endpoint instead of launching Chromium
    #[arg(long, global = true)]
    driver_url: Option<String>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries maps, plans and reports
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
    let visible = args.visible || config.browser.visible;

    let factory: Box<dyn PageFactory> =
        match args.driver_url.or_else(|| config.browser.driver_url.clone()) {
            Some(url) => {
                info!("Using WebDriver backend at {}", url);
                Box::new(WebDriverFactory::new(url, visible))
            }
            None => {
                let mut options = LaunchOptions::from(&config.browser);
                options.visible = visible;
                Box::new(HeadlessFactory::new(options))
            }
        };

    let output = OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    };
    if let Err(e) = cli::run_command(factory.as_ref(), &config.cascade, args.command, output).await
    {
        eprintln!("Error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
