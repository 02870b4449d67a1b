//! A single resumable download.

use futures::StreamExt;
use reqwest::Url;
use restful_client::ByteStream;
use restful_persist::{KvStore, Observable, Persistor};
use restful_types::ByteSize;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, DownloadResult};
use crate::transport::TaskTransport;

fn parse_uri(uri: &str) -> DownloadResult<Url> {
    Url::parse(uri).map_err(|e| DownloadError::InvalidUri {
        uri: uri.to_string(),
        message: e.to_string(),
    })
}

/// Scheme of a URI, e.g. `https`.
pub fn protocol_of(uri: &str) -> DownloadResult<String> {
    Ok(parse_uri(uri)?.scheme().to_string())
}

/// Percent-decoded last non-empty path segment of a URI.
///
/// ```
/// # use restful_downloader::name_of;
/// let name = name_of("https://example.com/files/My%20Report.pdf").unwrap();
/// assert_eq!(name, "My Report.pdf");
/// ```
pub fn name_of(uri: &str) -> DownloadResult<String> {
    let url = parse_uri(uri)?;

    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .ok_or_else(|| DownloadError::InvalidUri {
            uri: uri.to_string(),
            message: "no file name in path".to_string(),
        })?;

    Ok(urlencoding::decode(segment)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| segment.to_string()))
}

/// A download of `path` into `file_path`.
///
/// Progress fields are persisted under `{protocol}-download-task-{name}`,
/// so a task rebuilt after a restart resumes from its stored `loaded`
/// offset. `executing` is runtime state only.
pub struct DownloadTask {
    transport: Arc<dyn TaskTransport>,
    persistor: Persistor,
    pub id: Observable<String>,
    pub name: Observable<String>,
    pub path: Observable<String>,
    pub file_path: Observable<PathBuf>,
    pub total: Observable<u64>,
    pub loaded: Observable<u64>,
    /// `0.0..=100.0`
    pub percent: Observable<f64>,
    pub executing: Observable<bool>,
}

impl DownloadTask {
    pub fn new(
        store: Arc<dyn KvStore>,
        transport: Arc<dyn TaskTransport>,
        name: impl Into<String>,
        path: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> DownloadResult<Self> {
        let (name, path) = (name.into(), path.into());
        let id = format!("{}-download-task-{}", protocol_of(&path)?, name);

        let id = Observable::new(id);
        let name = Observable::new(name);
        let path = Observable::new(path);
        let file_path = Observable::new(file_path.into());
        let total = Observable::new(0);
        let loaded = Observable::new(0);
        let percent = Observable::new(0.0);

        let persistor = Persistor::new(store, id.get())
            .field("id", &id)
            .field("name", &name)
            .field("path", &path)
            .field("filePath", &file_path)
            .field("total", &total)
            .field("loaded", &loaded)
            .field("percent", &percent);

        Ok(Self {
            transport,
            persistor,
            id,
            name,
            path,
            file_path,
            total,
            loaded,
            percent,
            executing: Observable::new(false),
        })
    }

    /// Loads stored progress and starts persisting later changes.
    pub async fn restore(&self) -> DownloadResult<Vec<String>> {
        Ok(self.persistor.restore().await?)
    }

    /// Writes the current progress to the store right away.
    pub async fn flush(&self) -> DownloadResult<()> {
        Ok(self.persistor.flush().await?)
    }

    pub fn total_size(&self) -> ByteSize {
        ByteSize(self.total.get())
    }

    pub fn loaded_size(&self) -> ByteSize {
        ByteSize(self.loaded.get())
    }

    pub fn is_complete(&self) -> bool {
        self.percent.get() >= 100.0
    }

    /// Downloads until the stream ends or the task is paused.
    ///
    /// Returns immediately when the task is complete or already running.
    pub async fn run(&self) -> DownloadResult<()> {
        if self.is_complete() || self.executing.set(true) {
            return Ok(());
        }
        self.execute().await
    }

    /// Runs the task in the background.
    pub fn start(self: &Arc<Self>) -> JoinHandle<DownloadResult<()>> {
        let task = Arc::clone(self);
        let claimed = !task.is_complete() && !task.executing.set(true);

        tokio::spawn(async move {
            if claimed {
                task.execute().await
            } else {
                Ok(())
            }
        })
    }

    /// Stops a running transfer after its current chunk.
    pub fn pause(&self) {
        self.executing.set(false);
    }

    /// Pauses, then deletes the persisted progress. The file stays.
    pub async fn destroy(&self) -> DownloadResult<()> {
        self.pause();
        self.persistor.destroy().await?;
        Ok(())
    }

    async fn execute(&self) -> DownloadResult<()> {
        let result = self.transfer().await;
        self.executing.set(false);

        if let Err(e) = &result {
            warn!("Download {} failed: {}", self.id.get(), e);
        }
        result
    }

    async fn transfer(&self) -> DownloadResult<()> {
        let (path, file_path) = (self.path.get(), self.file_path.get());

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Never resume past what is actually on disk.
        let on_disk = match fs::metadata(&file_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        };
        let resume_from = self.loaded.get().min(on_disk);

        let ByteStream {
            offset,
            total,
            mut chunks,
        } = self.transport.open(&path, resume_from).await?;

        if let Some(total) = total {
            self.total.set(total);
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&file_path)
            .await?;
        file.set_len(offset).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        info!("Downloading {} into {:?} from byte {}", path, file_path, offset);

        let mut loaded = offset;
        self.record_progress(loaded);

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;

            loaded += chunk.len() as u64;
            self.record_progress(loaded);

            if !self.executing.get() {
                file.flush().await?;
                debug!("Paused {} at byte {}", self.id.get(), loaded);
                return Ok(());
            }
        }
        file.flush().await?;

        if self.total.get() == 0 {
            self.total.set(loaded);
            self.percent.set(100.0);
        }
        info!(
            "Downloaded {} ({})",
            self.name.get(),
            ByteSize(loaded)
        );
        Ok(())
    }

    fn record_progress(&self, loaded: u64) {
        self.loaded.set(loaded);

        let total = self.total.get();
        if total > 0 {
            self.percent
                .set((loaded as f64 * 100.0 / total as f64).min(100.0));
        }
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("id", &self.id.get())
            .field("loaded", &self.loaded.get())
            .field("total", &self.total.get())
            .field("executing", &self.executing.get())
            .finish()
    }
}
