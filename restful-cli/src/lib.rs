//! Command line access to REST resources through restful-models.
//!
//! The binary only parses arguments and prints; every command lives here
//! so it can be driven from tests.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use restful_client::{ClientConfig, HttpClient, RestClient};
use restful_downloader::{name_of, Downloader, DownloaderConfig};
use restful_model::{ItemModel, ListConfig, ListModel, QueryPages, QueryPagesConfig};
use restful_persist::SqliteStore;
use restful_types::{Filter, ItemId};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "restful")]
#[command(about = "Query REST resources and download files")]
pub struct Args {
    /// Base URI resource paths are resolved against
    #[arg(long, default_value = "http://localhost:1337/")]
    pub base_uri: String,

    /// Bearer token sent as `Authorization`
    #[arg(long)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// SQLite file holding persisted state
    #[arg(long, default_value = "restful-state.db")]
    pub state: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one item
    Get { resource: String, id: String },

    /// Fetch one page of a resource
    List {
        resource: String,

        /// 1-based page index
        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "10")]
        size: usize,

        /// Filter field as `key=value`; repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,

        /// Property holding the records of a wrapped response
        #[arg(long)]
        items_key: Option<String>,

        /// Property holding the total count of a wrapped response
        #[arg(long)]
        total_key: Option<String>,
    },

    /// Download a file, resuming an earlier partial download
    Download {
        url: String,

        /// Task name, the last URL segment by default
        #[arg(long)]
        name: Option<String>,

        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Parses `key=value`. The value is read as JSON when it parses, else as
/// a string.
pub fn parse_filter(input: &str) -> Result<(String, Value)> {
    let Some((key, value)) = input.split_once('=') else {
        bail!("filter `{input}` is not `key=value`");
    };
    if key.is_empty() {
        bail!("filter `{input}` has an empty key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    Ok((key.to_string(), value))
}

/// Builds the HTTP client of a command line.
pub async fn client(args: &Args) -> Result<Arc<dyn RestClient>> {
    let client = HttpClient::new(ClientConfig {
        base_uri: args.base_uri.clone(),
        timeout_secs: args.timeout,
        ..Default::default()
    })
    .context("Failed to create HTTP client")?;

    if let Some(token) = &args.token {
        client.set_token(token.clone()).await;
    }
    Ok(Arc::new(client))
}

pub async fn get_item(client: Arc<dyn RestClient>, resource: &str, id: &str) -> Result<Value> {
    let model: ItemModel<Value> = ItemModel::new(QueryPages::<Value>::new(client, resource));
    let id: ItemId = id.parse().context("Invalid item id")?;

    model
        .get_one(&id)
        .await
        .with_context(|| format!("Failed to get {resource}/{id}"))
}

/// Loads one page, reporting the list state alongside its items.
pub async fn list_page(
    client: Arc<dyn RestClient>,
    resource: &str,
    page: usize,
    size: usize,
    filter: Filter,
    config: QueryPagesConfig,
) -> Result<Value> {
    let pages = QueryPages::<Value>::with_config(client, resource, config);
    let list: ListModel<Value> = ListModel::with_config(Arc::new(pages), ListConfig { page_size: size });

    let items = list
        .get_list(Some(filter), Some(page), Some(size))
        .await
        .with_context(|| format!("Failed to list {resource}"))?;

    Ok(json!({
        "pageIndex": list.page_index.get(),
        "pageSize": list.page_size.get(),
        "totalCount": list.total_count.get(),
        "pageCount": list.page_count(),
        "noMore": list.no_more.get(),
        "items": items,
    }))
}

/// Downloads `url` into `dir` through the downloader persisted in `state`.
pub async fn download(
    state: &Path,
    url: &str,
    name: Option<String>,
    dir: PathBuf,
    timeout_secs: u64,
) -> Result<Value> {
    let store = Arc::new(
        SqliteStore::open(state)
            .with_context(|| format!("Failed to open state file {}", state.display()))?,
    );
    let config = DownloaderConfig {
        download_dir: dir,
        timeout_secs,
        ..Default::default()
    };
    let downloader = Downloader::open(store, config)
        .await
        .context("Failed to restore downloads")?;

    let name = match name {
        Some(name) => name,
        None => name_of(url)?,
    };
    let task = downloader.create_task(&name, url).await?;

    if task.loaded.get() > 0 {
        info!("Resuming {} at {}", name, task.loaded_size());
    }
    let result = task.run().await;
    downloader
        .flush()
        .await
        .context("Failed to save download state")?;
    result.with_context(|| format!("Failed to download {url}"))?;

    Ok(json!({
        "name": task.name.get(),
        "filePath": task.file_path.get().display().to_string(),
        "loaded": task.loaded.get(),
        "total": task.total.get(),
        "percent": task.percent.get(),
    }))
}

/// Runs a parsed command line, returning the JSON to print.
pub async fn run(args: Args) -> Result<Value> {
    match &args.command {
        Command::Get { resource, id } => get_item(client(&args).await?, resource, id).await,
        Command::List {
            resource,
            page,
            size,
            filters,
            items_key,
            total_key,
        } => {
            let config = QueryPagesConfig {
                items_key: items_key.clone(),
                total_key: total_key.clone(),
                ..Default::default()
            };
            let filter: Filter = filters.iter().cloned().collect();

            list_page(client(&args).await?, resource, *page, *size, filter, config).await
        }
        Command::Download { url, name, dir } => {
            let timeout = args.timeout.max(DownloaderConfig::default().timeout_secs);
            download(&args.state, url, name.clone(), dir.clone(), timeout).await
        }
    }
}
