//! `restful`: query REST resources and download files from the shell.
//!
//! Usage:
//!   restful --base-uri https://api.github.com/ get users octocat
//!   restful --base-uri https://api.github.com/ list orgs/idea2app/repos --size 5
//!   restful download https://example.com/archive.zip --dir downloads
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use restful_cli::{run, Args};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("{:?}", args.command);
    let output = run(args).await?;

    let text = serde_json::to_string_pretty(&output).context("Failed to render output")?;
    println!("{text}");
    Ok(())
}
