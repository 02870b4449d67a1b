//! Paginated list model with a page cache.
//!
//! `page_list` caches pages by index; `None` marks a page that was never
//! loaded (e.g. after jumping straight to page 3). Changing the page size
//! regroups every cached record into pages of the new size, and a regrouped
//! page containing an unloaded slot becomes unloaded itself.

use restful_persist::{KvStore, Observable, PersistOptions, Persistor};
use restful_types::{page_count, split_pages, Filter, ItemId, PageData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::base::{BaseModel, Status};
use crate::error::ModelResult;
use crate::item::ItemModel;
use crate::resource::{ItemResource, PageResource, Record};

/// List model settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Page size a fresh or cleared list starts with.
    pub page_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Observable, paginated view of one resource.
pub struct ListModel<D: Record, F: Record = Filter> {
    resource: Arc<dyn PageResource<D, F>>,
    item: ItemModel<D>,
    config: ListConfig,
    /// 1-based index of the current page, `0` before the first load.
    pub page_index: Observable<usize>,
    pub page_size: Observable<usize>,
    pub filter: Observable<F>,
    pub no_more: Observable<bool>,
    pub total_count: Observable<usize>,
    pub page_list: Observable<Vec<Option<Vec<D>>>>,
    /// Whether `total_count` was reported by the backend rather than
    /// counted from the loaded pages.
    total_reported: Observable<bool>,
}

impl<D: Record, F: Record> Clone for ListModel<D, F> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            item: self.item.clone(),
            config: self.config.clone(),
            page_index: self.page_index.clone(),
            page_size: self.page_size.clone(),
            filter: self.filter.clone(),
            no_more: self.no_more.clone(),
            total_count: self.total_count.clone(),
            page_list: self.page_list.clone(),
            total_reported: self.total_reported.clone(),
        }
    }
}

impl<D: Record, F: Record + Default> ListModel<D, F> {
    pub fn new(resource: impl PageResource<D, F> + 'static) -> Self {
        Self::with_config(Arc::new(resource), ListConfig::default())
    }

    pub fn with_config(resource: Arc<dyn PageResource<D, F>>, config: ListConfig) -> Self {
        let item_resource: Arc<dyn ItemResource<D>> = resource.clone();

        Self {
            resource,
            item: ItemModel::from_arc(item_resource),
            page_index: Observable::new(0),
            page_size: Observable::new(config.page_size),
            filter: Observable::new(F::default()),
            no_more: Observable::new(false),
            total_count: Observable::new(0),
            page_list: Observable::new(Vec::new()),
            total_reported: Observable::new(false),
            config,
        }
    }

    pub fn base(&self) -> &BaseModel {
        &self.item.base
    }

    pub fn item(&self) -> &ItemModel<D> {
        &self.item
    }

    pub fn current_one(&self) -> Option<D> {
        self.item.current_one.get()
    }

    pub fn resource(&self) -> &Arc<dyn PageResource<D, F>> {
        &self.resource
    }

    /// Records of the current page, empty when it is not loaded.
    pub fn current_page(&self) -> Vec<D> {
        let index = self.page_index.get();

        self.page_list.with(|pages| {
            index
                .checked_sub(1)
                .and_then(|i| pages.get(i))
                .and_then(|page| page.clone())
                .unwrap_or_default()
        })
    }

    /// Every cached record in order, with `page_size` placeholders for each
    /// unloaded page.
    pub fn all_items(&self) -> Vec<Option<D>> {
        let page_size = self.page_size.get();

        self.page_list.with(|pages| {
            pages
                .iter()
                .flat_map(|page| match page {
                    Some(items) => items.iter().cloned().map(Some).collect(),
                    None => vec![None; page_size],
                })
                .collect()
        })
    }

    /// Every cached record in order, skipping unloaded pages.
    pub fn loaded_items(&self) -> Vec<D> {
        self.page_list
            .with(|pages| pages.iter().flatten().flatten().cloned().collect())
    }

    pub fn page_count(&self) -> usize {
        page_count(self.total_count.get(), self.page_size.get())
    }

    /// `total_count`, when the backend reported it.
    pub fn reported_total(&self) -> Option<usize> {
        self.total_reported
            .get()
            .then(|| self.total_count.get())
    }

    /// Whether page `page_index` is in the cache.
    pub fn has_page(&self, page_index: usize) -> bool {
        self.page_list.with(|pages| {
            page_index
                .checked_sub(1)
                .and_then(|i| pages.get(i))
                .is_some_and(Option::is_some)
        })
    }

    /// Moves to a page without loading it, regrouping the cache when
    /// `page_size` differs from the current size.
    pub fn turn_to(&self, page_index: usize, page_size: Option<usize>) -> &Self {
        if let Some(page_size) = page_size {
            self.regroup(page_size);
        }
        self.page_index.set(page_index);
        self
    }

    fn regroup(&self, page_size: usize) {
        if page_size == 0 || page_size == self.page_size.get() {
            return;
        }
        let pages: Vec<Option<Vec<D>>> = split_pages(self.all_items(), page_size)
            .into_iter()
            .map(|page| page.into_iter().collect())
            .collect();

        debug!("Regrouped {} page(s) of {}", pages.len(), page_size);
        self.page_list.set(pages);
        self.page_size.set(page_size);
    }

    /// Loads a page.
    ///
    /// `filter`, `page_index` and `page_size` default to the stored filter,
    /// the page after the current one, and the stored size.
    pub async fn get_list(
        &self,
        filter: Option<F>,
        page_index: Option<usize>,
        page_size: Option<usize>,
    ) -> ModelResult<Vec<D>> {
        let _loading = self.base().toggle(Status::Downloading);

        let query = self.query(filter, page_index, page_size);
        self.fetch_list(query).await
    }

    pub async fn next_page(&self) -> ModelResult<Vec<D>> {
        self.get_list(None, None, None).await
    }

    /// Reloads the current page (the first one before any load).
    pub async fn refresh(&self) -> ModelResult<Vec<D>> {
        let page_index = self.page_index.get().max(1);
        self.get_list(None, Some(page_index), None).await
    }

    pub(crate) fn query(
        &self,
        filter: Option<F>,
        page_index: Option<usize>,
        page_size: Option<usize>,
    ) -> PageQuery<F> {
        PageQuery {
            filter: filter.unwrap_or_else(|| self.filter.get()),
            page_index: page_index
                .unwrap_or_else(|| self.page_index.get() + 1)
                .max(1),
            page_size: page_size.unwrap_or_else(|| self.page_size.get()).max(1),
        }
    }

    pub(crate) async fn fetch_list(&self, query: PageQuery<F>) -> ModelResult<Vec<D>> {
        let PageQuery {
            filter,
            page_index,
            page_size,
        } = query;

        self.regroup(page_size);

        let data = self.load_new_page(page_index, page_size, &filter).await?;
        self.filter.set(filter);

        Ok(self.flush_page(page_index, page_size, data))
    }

    /// Loads a page into the cache and updates `total_count`, without
    /// moving to it.
    ///
    /// A page whose size no longer matches the cache once it arrives is
    /// returned but not stored.
    pub(crate) async fn load_new_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>> {
        let data = self
            .resource
            .load_page(page_index, page_size, filter)
            .await?;

        if self.page_size.get() != page_size {
            debug!(
                "Dropped page {} of {}: page size changed to {}",
                page_index,
                page_size,
                self.page_size.get()
            );
            return Ok(data);
        }
        self.page_list.update(|pages| {
            if pages.len() < page_index {
                pages.resize(page_index, None);
            }
            if let Some(slot) = pages.get_mut(page_index.saturating_sub(1)) {
                *slot = Some(data.page_data.clone());
            }
        });
        let total_count = data.total_count.unwrap_or(
            page_index.saturating_sub(1) * page_size + data.page_data.len(),
        );
        self.total_count.set(total_count);
        self.total_reported.set(data.total_count.is_some());

        info!(
            "Loaded page {} of {} ({} record(s), {} total)",
            page_index,
            self.resource.base_uri(),
            data.page_data.len(),
            total_count
        );
        Ok(data)
    }

    /// Moves to a loaded page and derives `no_more` from it.
    pub(crate) fn flush_page(&self, page_index: usize, page_size: usize, data: PageData<D>) -> Vec<D> {
        self.turn_to(page_index, Some(page_size));

        let no_more = match data.total_count {
            Some(total) => page_index * page_size >= total,
            None => data.page_data.len() < page_size,
        };
        self.no_more.set(no_more);

        data.page_data
    }

    /// Caches the full pages in `records` that come before `page_index`,
    /// keeping pages already loaded.
    pub(crate) fn fill_pages(&self, records: &[D], page_index: usize, page_size: usize) {
        if page_size == 0 || self.page_size.get() != page_size {
            return;
        }
        self.page_list.update_if(|pages| {
            let mut filled = false;

            for (i, chunk) in records
                .chunks_exact(page_size)
                .take(page_index.saturating_sub(1))
                .enumerate()
            {
                if pages.len() <= i {
                    pages.resize(i + 1, None);
                }
                if pages[i].is_none() {
                    pages[i] = Some(chunk.to_vec());
                    filled = true;
                }
            }
            filled
        });
    }

    /// Resets every list field and the item state.
    pub fn clear(&self) -> &Self {
        self.page_index.set(0);
        self.page_size.set(self.config.page_size);
        self.filter.set(F::default());
        self.no_more.set(false);
        self.total_count.set(0);
        self.page_list.set(Vec::new());
        self.total_reported.set(false);
        self.item.clear();
        self
    }

    pub async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        self.item.get_one(id).await
    }

    /// Saves a record; an update also replaces the cached copy.
    pub async fn update_one<I>(&self, data: &I, id: Option<&ItemId>) -> ModelResult<D>
    where
        I: Serialize + ?Sized,
    {
        let one = self.item.update_one(data, id).await?;

        if let Some(id) = id {
            self.change_one(one.clone(), id);
        }
        Ok(one)
    }

    /// Deletes a record and drops it from the cache.
    pub async fn delete_one(&self, id: &ItemId) -> ModelResult<()> {
        self.item.delete_one(id).await?;
        self.remove_one(id);
        Ok(())
    }

    /// Replaces the cached record with index `id`. Returns whether one was
    /// found.
    pub fn change_one(&self, data: D, id: &ItemId) -> bool {
        let index_key = self.item.index_key();

        self.page_list.update_if(|pages| {
            for item in pages.iter_mut().flatten().flatten() {
                if ItemId::of(&*item, index_key).as_ref() == Some(id) {
                    *item = data;
                    return true;
                }
            }
            false
        })
    }

    /// Removes the record with index `id` from every cached page.
    pub fn remove_one(&self, id: &ItemId) -> bool {
        let index_key = self.item.index_key();

        let removed = self.page_list.update_if(|pages| {
            let mut removed = false;

            for page in pages.iter_mut().flatten() {
                let before = page.len();
                page.retain(|item| ItemId::of(item, index_key).as_ref() != Some(id));
                removed |= page.len() != before;
            }
            removed
        });
        if removed {
            self.total_count.update(|total| *total = total.saturating_sub(1));
        }
        removed
    }

    /// Mirrors the list state into `store` under `store_key` and restores
    /// whatever was saved there.
    ///
    /// The returned [`Persistor`] keeps saving changes until it is
    /// destroyed.
    pub async fn persist_list(
        &self,
        store: Arc<dyn KvStore>,
        store_key: impl Into<String>,
        expire_in: Option<Duration>,
    ) -> ModelResult<Persistor> {
        fn options<T: Record>(expire_in: Option<Duration>) -> PersistOptions<T> {
            let options = PersistOptions::default();

            match expire_in {
                Some(expire_in) => options.expire_in(expire_in),
                None => options,
            }
        }

        let persistor = Persistor::new(store, store_key)
            .field_with("pageIndex", &self.page_index, options(expire_in))
            .field_with("pageSize", &self.page_size, options(expire_in))
            .field_with("filter", &self.filter, options(expire_in))
            .field_with("totalCount", &self.total_count, options(expire_in))
            .field_with("noMore", &self.no_more, options(expire_in))
            .field_with("pageList", &self.page_list, options(expire_in))
            .field_with("totalReported", &self.total_reported, options(expire_in));

        persistor.restore().await?;
        Ok(persistor)
    }
}

/// Resolved arguments of one page load.
#[derive(Debug, Clone)]
pub(crate) struct PageQuery<F> {
    pub filter: F,
    pub page_index: usize,
    pub page_size: usize,
}

impl<D, F> fmt::Debug for ListModel<D, F>
where
    D: Record + fmt::Debug,
    F: Record + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListModel")
            .field("page_index", &self.page_index)
            .field("page_size", &self.page_size)
            .field("filter", &self.filter)
            .field("no_more", &self.no_more)
            .field("total_count", &self.total_count)
            .field("pages", &self.page_list.with(Vec::len))
            .finish_non_exhaustive()
    }
}
