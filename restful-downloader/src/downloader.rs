//! The persisted registry of download tasks.

use async_trait::async_trait;
use restful_persist::{Codec, KvStore, Observable, PersistOptions, PersistResult, Persistor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{DownloadError, DownloadResult};
use crate::task::{protocol_of, DownloadTask};
use crate::transport::{HttpTransport, TaskTransport};

/// Downloader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Directory new tasks write their files into.
    pub download_dir: PathBuf,
    /// Store key of the task list.
    pub store_key: String,
    /// Whole-transfer timeout of the default HTTP transport, in seconds.
    pub timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            store_key: "downloader".to_string(),
            timeout_secs: 3600,
        }
    }
}

/// Builds tasks through the protocol registry.
struct TaskFactory {
    store: Arc<dyn KvStore>,
    download_dir: PathBuf,
    protocols: RwLock<BTreeMap<String, Arc<dyn TaskTransport>>>,
}

impl TaskFactory {
    fn transport(&self, protocol: &str) -> DownloadResult<Arc<dyn TaskTransport>> {
        self.protocols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .cloned()
            .ok_or_else(|| DownloadError::UnregisteredProtocol(protocol.to_string()))
    }

    async fn create(&self, name: &str, path: &str) -> DownloadResult<Arc<DownloadTask>> {
        let transport = self.transport(&protocol_of(path)?)?;
        let file_path = self.download_dir.join(name.replace(['/', '\\'], "_"));

        let task = DownloadTask::new(Arc::clone(&self.store), transport, name, path, file_path)?;
        task.restore().await?;

        Ok(Arc::new(task))
    }
}

#[derive(Serialize, Deserialize)]
struct TaskEntry {
    name: String,
    path: String,
}

/// Stores tasks as `[{ name, path }]`, rebuilding them on restore.
struct TaskListCodec {
    factory: Arc<TaskFactory>,
}

#[async_trait]
impl Codec<Vec<Arc<DownloadTask>>> for TaskListCodec {
    async fn encode(&self, tasks: &Vec<Arc<DownloadTask>>) -> PersistResult<Value> {
        let entries: Vec<TaskEntry> = tasks
            .iter()
            .map(|task| TaskEntry {
                name: task.name.get(),
                path: task.path.get(),
            })
            .collect();

        Ok(serde_json::to_value(entries)?)
    }

    async fn decode(&self, stored: Value) -> PersistResult<Vec<Arc<DownloadTask>>> {
        let entries: Vec<TaskEntry> = serde_json::from_value(stored)?;
        let mut tasks = Vec::with_capacity(entries.len());

        for TaskEntry { name, path } in entries {
            match self.factory.create(&name, &path).await {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("Dropping stored task {}: {}", name, e),
            }
        }
        Ok(tasks)
    }
}

/// Download tasks by protocol, persisted across restarts.
///
/// `http` and `https` are registered by default; other schemes need a
/// [`TaskTransport`] registered before [`Downloader::restore`].
pub struct Downloader {
    factory: Arc<TaskFactory>,
    persistor: Persistor,
    pub tasks: Observable<Vec<Arc<DownloadTask>>>,
}

impl Downloader {
    /// Creates an empty downloader. Call [`Downloader::restore`] to load
    /// stored tasks.
    pub fn new(store: Arc<dyn KvStore>, config: DownloaderConfig) -> DownloadResult<Self> {
        let http: Arc<dyn TaskTransport> = Arc::new(HttpTransport::with_timeout(config.timeout_secs)?);

        let mut protocols = BTreeMap::new();
        protocols.insert("http".to_string(), Arc::clone(&http));
        protocols.insert("https".to_string(), http);

        let factory = Arc::new(TaskFactory {
            store: Arc::clone(&store),
            download_dir: config.download_dir,
            protocols: RwLock::new(protocols),
        });
        let tasks = Observable::new(Vec::new());

        let codec = TaskListCodec {
            factory: Arc::clone(&factory),
        };
        let persistor = Persistor::new(store, config.store_key)
            .field_with("tasks", &tasks, PersistOptions::with_codec(codec));

        Ok(Self {
            factory,
            persistor,
            tasks,
        })
    }

    /// Creates a downloader and restores its stored tasks.
    pub async fn open(store: Arc<dyn KvStore>, config: DownloaderConfig) -> DownloadResult<Self> {
        let downloader = Self::new(store, config)?;
        downloader.restore().await?;
        Ok(downloader)
    }

    /// Routes URIs of `protocol` through `transport`.
    pub fn register(&self, protocol: impl Into<String>, transport: Arc<dyn TaskTransport>) {
        self.factory
            .protocols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol.into(), transport);
    }

    /// Loads stored tasks with their progress. Returns the task count.
    pub async fn restore(&self) -> DownloadResult<usize> {
        self.persistor.restore().await?;

        let count = self.tasks.with(Vec::len);
        if count > 0 {
            info!("Restored {} download tasks", count);
        }
        Ok(count)
    }

    /// Returns the task downloading `path`, creating it when new.
    pub async fn create_task(&self, name: &str, path: &str) -> DownloadResult<Arc<DownloadTask>> {
        if let Some(task) = self
            .tasks
            .with(|tasks| tasks.iter().find(|task| task.path.get() == path).cloned())
        {
            debug!("Reusing download task {}", task.id.get());
            return Ok(task);
        }
        let task = self.factory.create(name, path).await?;
        self.tasks.update(|tasks| tasks.push(Arc::clone(&task)));

        Ok(task)
    }

    pub fn task(&self, name: &str) -> Option<Arc<DownloadTask>> {
        self.tasks
            .with(|tasks| tasks.iter().find(|task| task.name.get() == name).cloned())
    }

    /// Stops the task `name`, deletes its stored progress and drops it.
    pub async fn destroy_task(&self, name: &str) -> DownloadResult<()> {
        let task = self
            .task(name)
            .ok_or_else(|| DownloadError::NotFound(name.to_string()))?;

        task.destroy().await?;
        self.tasks
            .update(|tasks| tasks.retain(|other| !Arc::ptr_eq(other, &task)));

        Ok(())
    }

    /// Writes the task list and every task's progress right away.
    pub async fn flush(&self) -> DownloadResult<()> {
        self.persistor.flush().await?;

        for task in self.tasks.get() {
            task.flush().await?;
        }
        Ok(())
    }

    /// Tasks below 100 percent.
    pub fn unfinished_count(&self) -> usize {
        self.tasks
            .with(|tasks| tasks.iter().filter(|task| !task.is_complete()).count())
    }

    pub fn executing_count(&self) -> usize {
        self.tasks
            .with(|tasks| tasks.iter().filter(|task| task.executing.get()).count())
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("store_key", &self.persistor.store_key())
            .field("tasks", &self.tasks.with(Vec::len))
            .finish()
    }
}
