//! List model cutting pages out of one record stream.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use restful_client::RestClient;
use restful_types::{Filter, ItemId, PageData};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ModelResult;
use crate::list::{ListConfig, ListModel};
use crate::resource::{ItemResource, PageResource, Record, StreamResource};

struct StreamState<D> {
    stream: Option<BoxStream<'static, ModelResult<D>>>,
    /// Records pulled so far.
    items: Vec<D>,
    ended: bool,
}

impl<D> Default for StreamState<D> {
    fn default() -> Self {
        Self {
            stream: None,
            items: Vec::new(),
            ended: false,
        }
    }
}

/// Serves pages of a [`StreamResource`], pulling only as far as needed.
struct StreamPages<D: Record, F: Record> {
    resource: Arc<dyn StreamResource<D, F>>,
    state: Mutex<StreamState<D>>,
}

impl<D: Record, F: Record> StreamPages<D, F> {
    async fn reset(&self) {
        *self.state.lock().await = StreamState::default();
    }
}

#[async_trait]
impl<D: Record, F: Record> ItemResource<D> for StreamPages<D, F> {
    fn client(&self) -> &dyn RestClient {
        self.resource.client()
    }

    fn base_uri(&self) -> &str {
        self.resource.base_uri()
    }

    fn index_key(&self) -> &str {
        self.resource.index_key()
    }

    async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        self.resource.get_one(id).await
    }

    async fn update_one(&self, data: &Value, id: Option<&ItemId>) -> ModelResult<D> {
        self.resource.update_one(data, id).await
    }

    async fn delete_one(&self, id: &ItemId) -> ModelResult<()> {
        self.resource.delete_one(id).await
    }
}

#[async_trait]
impl<D: Record, F: Record> PageResource<D, F> for StreamPages<D, F> {
    async fn load_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>> {
        let mut state = self.state.lock().await;
        let end = page_index * page_size;

        if state.stream.is_none() && !state.ended {
            debug!("Opening stream of {}", self.resource.base_uri());
            state.stream = Some(self.resource.open_stream(filter));
        }
        while state.items.len() < end && !state.ended {
            let next = match state.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => None,
            };
            match next {
                Some(item) => state.items.push(item?),
                None => {
                    state.ended = true;
                    state.stream = None;
                }
            }
        }
        let start = (page_index.saturating_sub(1) * page_size).min(state.items.len());
        let end = end.min(state.items.len());

        Ok(PageData::new(state.items[start..end].to_vec()))
    }
}

/// A [`ListModel`] over a [`StreamResource`].
///
/// The backend reports no total, so `no_more` turns true on the first
/// short page.
pub struct StreamListModel<D: Record, F: Record = Filter> {
    list: ListModel<D, F>,
    pages: Arc<StreamPages<D, F>>,
}

impl<D: Record, F: Record + Default> StreamListModel<D, F> {
    pub fn new(resource: impl StreamResource<D, F> + 'static) -> Self {
        Self::with_config(Arc::new(resource), ListConfig::default())
    }

    pub fn with_config(resource: Arc<dyn StreamResource<D, F>>, config: ListConfig) -> Self {
        let pages = Arc::new(StreamPages {
            resource,
            state: Mutex::new(StreamState::default()),
        });
        let list = ListModel::with_config(pages.clone(), config);

        Self { list, pages }
    }

    pub fn list(&self) -> &ListModel<D, F> {
        &self.list
    }

    /// Loads a page. Every full page pulled on the way to it is cached
    /// too, so jumping ahead leaves no gaps.
    pub async fn get_list(
        &self,
        filter: Option<F>,
        page_index: Option<usize>,
        page_size: Option<usize>,
    ) -> ModelResult<Vec<D>> {
        let page = self.list.get_list(filter, page_index, page_size).await?;

        let state = self.pages.state.lock().await;
        self.list
            .fill_pages(&state.items, self.list.page_index.get(), self.list.page_size.get());

        Ok(page)
    }

    pub async fn next_page(&self) -> ModelResult<Vec<D>> {
        self.get_list(None, None, None).await
    }

    /// Drops the stream and resets the list.
    pub async fn clear(&self) -> &Self {
        self.pages.reset().await;
        self.list.clear();
        self
    }
}

impl<D: Record, F: Record> Clone for StreamListModel<D, F> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            pages: Arc::clone(&self.pages),
        }
    }
}

impl<D: Record, F: Record> Deref for StreamListModel<D, F> {
    type Target = ListModel<D, F>;

    fn deref(&self) -> &Self::Target {
        &self.list
    }
}

impl<D, F> fmt::Debug for StreamListModel<D, F>
where
    D: Record + fmt::Debug,
    F: Record + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamListModel")
            .field("list", &self.list)
            .finish_non_exhaustive()
    }
}
