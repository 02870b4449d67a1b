//! Page resource for plain query-string paginated REST APIs.

use async_trait::async_trait;
use restful_client::{RestClient, RestRequest};
use restful_types::PageData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::error::ModelResult;
use crate::resource::{ItemResource, PageResource, Record};

/// How a plain REST API paginates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPagesConfig {
    /// Query parameter carrying the 1-based page index.
    pub page_param: String,
    /// Query parameter carrying the page size.
    pub size_param: String,
    /// Property holding the records when the body is an object; a bare
    /// array is expected when unset.
    pub items_key: Option<String>,
    /// Property holding the total count. Falls back to the
    /// `X-Total-Count` header.
    pub total_key: Option<String>,
    pub index_key: String,
}

impl Default for QueryPagesConfig {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            size_param: "per_page".to_string(),
            items_key: None,
            total_key: None,
            index_key: "id".to_string(),
        }
    }
}

/// Pages `GET {base}?{filter}&page=N&per_page=M`.
pub struct QueryPages<D> {
    client: Arc<dyn RestClient>,
    base_uri: String,
    config: QueryPagesConfig,
    _record: PhantomData<fn() -> D>,
}

impl<D> QueryPages<D> {
    pub fn new(client: Arc<dyn RestClient>, base_uri: impl Into<String>) -> Self {
        Self::with_config(client, base_uri, QueryPagesConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn RestClient>,
        base_uri: impl Into<String>,
        config: QueryPagesConfig,
    ) -> Self {
        Self {
            client,
            base_uri: base_uri.into(),
            config,
            _record: PhantomData,
        }
    }

    pub fn config(&self) -> &QueryPagesConfig {
        &self.config
    }
}

/// Encodes the scalar fields of a filter as `key=value` pairs.
///
/// Nulls are skipped, strings are sent bare, and everything else in its
/// JSON form.
pub fn query_pairs<F: Serialize>(filter: &F) -> ModelResult<Vec<(String, String)>> {
    let Value::Object(fields) = serde_json::to_value(filter)? else {
        return Ok(Vec::new());
    };

    Ok(fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

#[async_trait]
impl<D: Record> ItemResource<D> for QueryPages<D> {
    fn client(&self) -> &dyn RestClient {
        &*self.client
    }

    fn base_uri(&self) -> &str {
        &self.base_uri
    }

    fn index_key(&self) -> &str {
        &self.config.index_key
    }
}

#[async_trait]
impl<D: Record, F: Record> PageResource<D, F> for QueryPages<D> {
    async fn load_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>> {
        let mut pairs = query_pairs(filter)?;
        pairs.push((self.config.page_param.clone(), page_index.to_string()));
        pairs.push((self.config.size_param.clone(), page_size.to_string()));

        debug!("Loading page {} of {}", page_index, self.base_uri);

        let request = RestRequest::get(self.base_uri.clone()).query(pairs);
        let response = self.client.send(request).await?;
        let body: Value = response.json()?;

        let items = match &self.config.items_key {
            Some(key) => body.get(key).cloned().unwrap_or(Value::Array(Vec::new())),
            None => body.clone(),
        };
        let total_count = match &self.config.total_key {
            Some(key) => body.get(key).and_then(Value::as_u64),
            None => response
                .header("x-total-count")
                .and_then(|total| total.trim().parse().ok()),
        };

        Ok(PageData {
            page_data: serde_json::from_value(items)?,
            total_count: total_count.map(|total| total as usize),
        })
    }
}
