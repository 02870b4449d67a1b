//! Resumable download tasks, persisted across restarts.
//!
//! A [`Downloader`] keeps a list of [`DownloadTask`]s in a
//! [`restful_persist::KvStore`]. Every task persists its own progress, so
//! a task rebuilt after a restart continues from the last written byte.
//!
//! # Example
//!
//! ```no_run
//! use restful_downloader::{Downloader, DownloaderConfig};
//! use restful_persist::SqliteStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("state.db")?);
//! let downloader = Downloader::open(store, DownloaderConfig::default()).await?;
//!
//! let task = downloader
//!     .create_task("rust.tar.gz", "https://example.com/rust.tar.gz")
//!     .await?;
//! task.run().await?;
//! println!("{} of {}", task.loaded_size(), task.total_size());
//! # Ok(())
//! # }
//! ```

mod downloader;
mod error;
mod task;
mod transport;

pub use downloader::{Downloader, DownloaderConfig};
pub use error::{DownloadError, DownloadResult};
pub use task::{name_of, protocol_of, DownloadTask};
pub use transport::{HttpTransport, TaskTransport};
