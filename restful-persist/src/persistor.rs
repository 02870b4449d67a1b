//! Field-level persistence with expiration.
//!
//! A [`Persistor`] owns the persisted fields of one model instance. Each
//! field lives in the store under `"{store_key}-{field_key}"`, wrapped in a
//! [`PersistBox`] carrying its expiry. After [`Persistor::restore`], every
//! change of a field is written back by a background reaction until
//! [`Persistor::destroy`] stops it.

use async_trait::async_trait;
use restful_types::now_millis;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{Codec, JsonCodec};
use crate::error::PersistResult;
use crate::observable::Observable;
use crate::store::KvStore;

/// Stored envelope of a persisted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistBox {
    pub value: Value,
    /// Milliseconds since epoch after which the value is stale; `None`
    /// never expires.
    #[serde(rename = "expireAt", default)]
    pub expire_at: Option<i64>,
}

impl PersistBox {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at < now)
    }
}

/// Per-field persistence options.
pub struct PersistOptions<T> {
    /// Lifetime of a saved value; `None` keeps it forever.
    pub expire_in: Option<Duration>,
    pub codec: Arc<dyn Codec<T>>,
}

impl<T> PersistOptions<T> {
    /// Options with a custom codec and no expiry.
    pub fn with_codec(codec: impl Codec<T> + 'static) -> Self {
        Self {
            expire_in: None,
            codec: Arc::new(codec),
        }
    }

    #[must_use]
    pub fn expire_in(mut self, expire_in: Duration) -> Self {
        self.expire_in = Some(expire_in);
        self
    }
}

impl<T> Default for PersistOptions<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl<T> Clone for PersistOptions<T> {
    fn clone(&self) -> Self {
        Self {
            expire_in: self.expire_in,
            codec: Arc::clone(&self.codec),
        }
    }
}

#[async_trait]
trait PersistField: Send + Sync {
    fn key(&self) -> &str;

    /// Loads the stored value into the field. Returns the stored JSON
    /// when a live value was restored.
    async fn load(&self, store: &dyn KvStore, storage_key: &str) -> PersistResult<Option<Value>>;

    async fn save_current(&self, store: &dyn KvStore, storage_key: &str) -> PersistResult<()>;

    /// Spawns the reaction writing later changes back to the store.
    fn react(&self, store: Arc<dyn KvStore>, storage_key: String) -> JoinHandle<()>;
}

struct PersistNode<T> {
    key: String,
    field: Observable<T>,
    options: PersistOptions<T>,
}

impl<T> Clone for PersistNode<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            field: self.field.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T> PersistNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn save(&self, store: &dyn KvStore, storage_key: &str, value: &T) -> PersistResult<()> {
        let value = self.options.codec.encode(value).await?;
        let expire_at = self
            .options
            .expire_in
            .map(|expire_in| now_millis().saturating_add(expire_in.as_millis() as i64));

        let data = PersistBox { value, expire_at };
        store.set(storage_key, serde_json::to_value(data)?).await
    }
}

#[async_trait]
impl<T> PersistField for PersistNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn key(&self) -> &str {
        &self.key
    }

    async fn load(&self, store: &dyn KvStore, storage_key: &str) -> PersistResult<Option<Value>> {
        let Some(stored) = store.get(storage_key).await? else {
            return Ok(None);
        };
        let data: PersistBox = match serde_json::from_value(stored) {
            Ok(data) => data,
            Err(e) => {
                warn!("Discarding malformed entry {}: {}", storage_key, e);
                store.del(storage_key).await?;
                return Ok(None);
            }
        };

        if data.is_expired(now_millis()) {
            debug!("Entry {} expired", storage_key);
            store.del(storage_key).await?;
            return Ok(None);
        }
        if data.value.is_null() {
            return Ok(None);
        }

        let value = self.options.codec.decode(data.value.clone()).await?;
        self.field.set(value);

        Ok(Some(data.value))
    }

    async fn save_current(&self, store: &dyn KvStore, storage_key: &str) -> PersistResult<()> {
        let value = self.field.get();
        self.save(store, storage_key, &value).await
    }

    fn react(&self, store: Arc<dyn KvStore>, storage_key: String) -> JoinHandle<()> {
        let node = self.clone();
        let mut receiver = self.field.subscribe();
        receiver.borrow_and_update();

        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let value = receiver.borrow_and_update().clone();

                if let Err(e) = node.save(&*store, &storage_key, &value).await {
                    warn!("Failed to save {}: {}", storage_key, e);
                }
            }
        })
    }
}

/// The persisted fields of one model instance.
///
/// Changes are saved while the persistor is alive; dropping it stops the
/// reactions without touching the store.
pub struct Persistor {
    store: Arc<dyn KvStore>,
    store_key: String,
    fields: Vec<Box<dyn PersistField>>,
    reactions: Mutex<Vec<JoinHandle<()>>>,
}

impl Persistor {
    pub fn new(store: Arc<dyn KvStore>, store_key: impl Into<String>) -> Self {
        Self {
            store,
            store_key: store_key.into(),
            fields: Vec::new(),
            reactions: Mutex::new(Vec::new()),
        }
    }

    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Registers a field stored through serde, never expiring.
    #[must_use]
    pub fn field<T>(self, key: impl Into<String>, field: &Observable<T>) -> Self
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.field_with(key, field, PersistOptions::default())
    }

    /// Registers a field with explicit options.
    #[must_use]
    pub fn field_with<T>(
        mut self,
        key: impl Into<String>,
        field: &Observable<T>,
        options: PersistOptions<T>,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.fields.push(Box::new(PersistNode {
            key: key.into(),
            field: field.clone(),
            options,
        }));
        self
    }

    /// Store key of a registered field.
    pub fn storage_key(&self, field_key: &str) -> String {
        format!("{}-{}", self.store_key, field_key)
    }

    /// Field keys in registration order.
    pub fn field_keys(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.key()).collect()
    }

    /// Loads every field from the store and starts saving later changes.
    ///
    /// Returns the keys of the fields that received a stored value.
    pub async fn restore(&self) -> PersistResult<Vec<String>> {
        self.stop_reactions();

        let mut restored = BTreeMap::new();
        let mut reactions = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let storage_key = self.storage_key(field.key());

            if let Some(value) = field.load(&*self.store, &storage_key).await? {
                restored.insert(field.key().to_string(), value);
            }
            reactions.push(field.react(Arc::clone(&self.store), storage_key));
        }
        *self.lock_reactions() = reactions;

        if !restored.is_empty() {
            info!(
                "Restored {}: {}",
                self.store_key,
                serde_json::to_string(&restored).unwrap_or_default()
            );
        }
        Ok(restored.into_keys().collect())
    }

    /// Writes every field's current value immediately.
    pub async fn flush(&self) -> PersistResult<()> {
        for field in &self.fields {
            let storage_key = self.storage_key(field.key());
            field.save_current(&*self.store, &storage_key).await?;
        }
        Ok(())
    }

    /// Stops every reaction and deletes every field from the store.
    pub async fn destroy(&self) -> PersistResult<()> {
        self.stop_reactions();

        for field in &self.fields {
            self.store.del(&self.storage_key(field.key())).await?;
        }
        debug!("Destroyed {}", self.store_key);
        Ok(())
    }

    fn stop_reactions(&self) {
        for reaction in self.lock_reactions().drain(..) {
            reaction.abort();
        }
    }

    fn lock_reactions(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.reactions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Persistor {
    /// Stops saving changes; stored values stay.
    fn drop(&mut self) {
        self.stop_reactions();
    }
}

impl std::fmt::Debug for Persistor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistor")
            .field("store_key", &self.store_key)
            .field("fields", &self.field_keys())
            .finish()
    }
}
