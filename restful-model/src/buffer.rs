//! List model that prefetches the next page in the background.

use futures::future::{BoxFuture, FutureExt, Shared};
use restful_types::{Filter, PageData};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::base::Status;
use crate::error::{ModelError, ModelResult};
use crate::list::{ListConfig, ListModel, PageQuery};
use crate::resource::{PageResource, Record};

type SharedPage<D> = Shared<BoxFuture<'static, Result<PageData<D>, Arc<ModelError>>>>;

struct Prefetch<D> {
    page_size: usize,
    page: SharedPage<D>,
    task: AbortHandle,
}

/// A [`ListModel`] that loads page `n + 1` while page `n` is on screen.
///
/// A request for a page that is being prefetched waits for that prefetch
/// instead of sending a second request.
pub struct BufferListModel<D: Record, F: Record = Filter> {
    list: ListModel<D, F>,
    pending: Arc<Mutex<BTreeMap<usize, Prefetch<D>>>>,
}

impl<D: Record, F: Record> Clone for BufferListModel<D, F> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<D: Record, F: Record + Default> BufferListModel<D, F> {
    pub fn new(resource: impl PageResource<D, F> + 'static) -> Self {
        Self::from_list(ListModel::new(resource))
    }

    pub fn with_config(resource: Arc<dyn PageResource<D, F>>, config: ListConfig) -> Self {
        Self::from_list(ListModel::with_config(resource, config))
    }

    pub fn from_list(list: ListModel<D, F>) -> Self {
        Self {
            list,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn list(&self) -> &ListModel<D, F> {
        &self.list
    }

    /// Whether a prefetch of `page_index` is in flight.
    pub fn is_pending(&self, page_index: usize) -> bool {
        self.lock_pending().contains_key(&page_index)
    }

    /// Loads a page, reusing an in-flight prefetch of the same size or the
    /// cache, then prefetches the following page.
    pub async fn get_list(
        &self,
        filter: Option<F>,
        page_index: Option<usize>,
        page_size: Option<usize>,
    ) -> ModelResult<Vec<D>> {
        let _loading = self.list.base().toggle(Status::Downloading);

        let query = self.list.query(filter, page_index, page_size);
        let PageQuery {
            page_index,
            page_size,
            ..
        } = query;

        let pending = self
            .lock_pending()
            .get(&page_index)
            .filter(|prefetch| prefetch.page_size == page_size)
            .map(|prefetch| prefetch.page.clone());

        let page = if let Some(pending) = pending {
            debug!("Waiting for prefetched page {}", page_index);
            let data = pending.await.map_err(ModelError::Prefetch)?;

            self.list.flush_page(page_index, page_size, data)
        } else if self.list.has_page(page_index) {
            debug!("Page {} served from cache", page_index);
            self.list.turn_to(page_index, Some(page_size));
            let cached = PageData {
                page_data: self.list.current_page(),
                total_count: self.list.reported_total(),
            };

            self.list.flush_page(page_index, page_size, cached)
        } else {
            self.list.fetch_list(query.clone()).await?
        };

        self.prefetch(PageQuery {
            page_index: page_index + 1,
            ..query
        });
        Ok(page)
    }

    pub async fn next_page(&self) -> ModelResult<Vec<D>> {
        self.get_list(None, None, None).await
    }

    fn prefetch(&self, query: PageQuery<F>) {
        let PageQuery {
            page_index,
            page_size,
            ..
        } = query;

        if self.list.no_more.get() || self.list.has_page(page_index) {
            return;
        }
        let mut pending = self.lock_pending();

        if pending.contains_key(&page_index) {
            return;
        }
        let list = self.list.clone();
        let registry = Arc::clone(&self.pending);

        let page: SharedPage<D> = async move {
            let result = list
                .load_new_page(query.page_index, query.page_size, &query.filter)
                .await
                .map_err(Arc::new);

            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&page_index);

            if let Err(e) = &result {
                warn!("Prefetch of page {} failed: {}", page_index, e);
            }
            result
        }
        .boxed()
        .shared();

        let driver = page.clone();
        let task = tokio::spawn(async move {
            let _ = driver.await;
        })
        .abort_handle();

        debug!("Prefetching page {}", page_index);
        pending.insert(
            page_index,
            Prefetch {
                page_size,
                page,
                task,
            },
        );
    }

    /// Drops pending prefetches and resets the list.
    pub fn clear(&self) -> &Self {
        for (_, prefetch) in std::mem::take(&mut *self.lock_pending()) {
            prefetch.task.abort();
        }
        self.list.clear();
        self
    }

    fn lock_pending(&self) -> MutexGuard<'_, BTreeMap<usize, Prefetch<D>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Record, F: Record> Deref for BufferListModel<D, F> {
    type Target = ListModel<D, F>;

    fn deref(&self) -> &Self::Target {
        &self.list
    }
}

impl<D, F> fmt::Debug for BufferListModel<D, F>
where
    D: Record + fmt::Debug,
    F: Record + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending: Vec<usize> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();

        f.debug_struct("BufferListModel")
            .field("list", &self.list)
            .field("pending", &pending)
            .finish()
    }
}
