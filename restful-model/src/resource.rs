//! Backend resources models load their data from.

use async_trait::async_trait;
use futures::stream::BoxStream;
use restful_client::{RestClient, RestRequest};
use restful_types::{Filter, ItemId, PageData};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ModelResult;

/// A record or filter a model can hold, send and persist.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Record for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A REST collection addressed by a base URI.
///
/// The default methods speak plain REST: `GET/PUT/DELETE {base}/{id}` and
/// `POST {base}`. Backend adapters override them.
#[async_trait]
pub trait ItemResource<D: Record>: Send + Sync {
    fn client(&self) -> &dyn RestClient;

    /// Collection path, relative to the client's base URI.
    fn base_uri(&self) -> &str;

    /// Property holding a record's identifier.
    fn index_key(&self) -> &str {
        "id"
    }

    fn item_path(&self, id: &ItemId) -> String {
        format!("{}/{}", self.base_uri().trim_end_matches('/'), id)
    }

    async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        let response = self.client().send(RestRequest::get(self.item_path(id))).await?;
        Ok(response.json()?)
    }

    /// Updates the record `id`, or creates one when `id` is `None`.
    async fn update_one(&self, data: &Value, id: Option<&ItemId>) -> ModelResult<D> {
        let request = match id {
            Some(id) => RestRequest::put(self.item_path(id)),
            None => RestRequest::post(self.base_uri()),
        };
        let response = self.client().send(request.json_value(data.clone())).await?;
        Ok(response.json()?)
    }

    async fn delete_one(&self, id: &ItemId) -> ModelResult<()> {
        debug!("DELETE {}", self.item_path(id));
        self.client()
            .send(RestRequest::delete(self.item_path(id)))
            .await?;
        Ok(())
    }
}

/// A collection that can be read page by page.
#[async_trait]
pub trait PageResource<D: Record, F: Record = Filter>: ItemResource<D> {
    /// Loads page `page_index` (1-based) of `page_size` records.
    async fn load_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>>;
}

/// A collection read as one continuous stream of records.
pub trait StreamResource<D: Record, F: Record = Filter>: ItemResource<D> {
    fn open_stream(&self, filter: &F) -> BoxStream<'static, ModelResult<D>>;
}
