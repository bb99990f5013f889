use anyhow::Context;
use clap::Parser;
use gazet_engine::cli::{self, Command, OutputHandlers};
use gazet_engine::config::ConfigLoader;
use gazet_h::backend::HeadlessFactory;
use gazet_h::cdp::LaunchOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gazet-h", version, about = "Cascading dropdown harvester over headless Chromium")]
struct Args {
    /// Configuration file (default: ./gazet.yaml, then ~/.gazet/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let mut options = LaunchOptions::from(&config.browser);
    options.visible |= args.visible;

    let factory = HeadlessFactory::new(options);
    let output = OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    };
    cli::run_command(&factory, &config.cascade, args.command, output).await?;
    Ok(())
}
