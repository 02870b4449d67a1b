//! Supabase (PostgREST) resources.

use async_trait::async_trait;
use restful_client::{
    content_range_total, ClientConfig, ClientResult, HttpClient, RestClient, RestRequest,
};
use restful_model::{ItemResource, ModelResult, PageResource, Record};
use restful_types::{ItemId, PageData};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Builds a client for `{api_host}/rest/v1/` sending the project key as
/// both `apikey` and bearer token.
pub fn supabase_client(api_host: &str, api_key: &str) -> ClientResult<HttpClient> {
    let mut config = ClientConfig {
        base_uri: format!("{}/rest/v1/", api_host.trim_end_matches('/')),
        ..Default::default()
    };
    config
        .default_headers
        .insert("apikey".to_string(), api_key.to_string());
    config
        .default_headers
        .insert("Authorization".to_string(), format!("Bearer {api_key}"));

    HttpClient::new(config)
}

/// A Supabase table, e.g. `countries`.
///
/// Pages through `Range` headers, reading the total from `Content-Range`.
/// Array filter values match with `cs` (contains), scalars with `eq`.
pub struct SupabaseResource<D> {
    client: Arc<dyn RestClient>,
    table: String,
    index_key: String,
    _record: PhantomData<fn() -> D>,
}

impl<D> SupabaseResource<D> {
    pub fn new(client: Arc<dyn RestClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            index_key: "id".to_string(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn with_index_key(mut self, index_key: impl Into<String>) -> Self {
        self.index_key = index_key.into();
        self
    }

    /// Narrows `request` to the row `{index_key}=eq.{id}`.
    fn row(&self, request: RestRequest, id: &ItemId) -> RestRequest {
        request.query([(self.index_key.clone(), format!("eq.{id}"))])
    }
}

/// PostgREST condition of one filter value.
pub fn condition(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(plain).collect();
            format!("cs.{{{}}}", items.join(","))
        }
        other => format!("eq.{}", plain(other)),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn first_row(body: Value) -> Value {
    match body {
        Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
        row => row,
    }
}

#[async_trait]
impl<D: Record> ItemResource<D> for SupabaseResource<D> {
    fn client(&self) -> &dyn RestClient {
        &*self.client
    }

    fn base_uri(&self) -> &str {
        &self.table
    }

    fn index_key(&self) -> &str {
        &self.index_key
    }

    async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        let request = self
            .row(RestRequest::get(self.table.clone()), id)
            .header("Accept", "application/vnd.pgrst.object+json");

        let body: Value = self.client.send(request).await?.json()?;
        Ok(serde_json::from_value(first_row(body))?)
    }

    /// Patches the row `id`, or inserts one, returning the stored row.
    async fn update_one(&self, data: &Value, id: Option<&ItemId>) -> ModelResult<D> {
        let request = match id {
            Some(id) => self.row(RestRequest::patch(self.table.clone()), id),
            None => RestRequest::post(self.table.clone()),
        };
        let request = request
            .header("Prefer", "return=representation")
            .json_value(data.clone());

        let body: Value = self.client.send(request).await?.json()?;
        Ok(serde_json::from_value(first_row(body))?)
    }

    async fn delete_one(&self, id: &ItemId) -> ModelResult<()> {
        self.client
            .send(self.row(RestRequest::delete(self.table.clone()), id))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<D: Record, F: Record> PageResource<D, F> for SupabaseResource<D> {
    async fn load_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>> {
        let start = page_index.saturating_sub(1) * page_size;
        let end = (page_index * page_size).saturating_sub(1);

        let mut pairs: Vec<(String, String)> = match serde_json::to_value(filter)? {
            Value::Object(fields) => fields
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key, condition(&value)))
                .collect(),
            _ => Vec::new(),
        };
        pairs.push(("select".to_string(), "*".to_string()));

        debug!("Loading Supabase rows {}-{} of {}", start, end, self.table);

        let response = self
            .client
            .send(
                RestRequest::get(self.table.clone())
                    .query(pairs)
                    .header("Range", format!("{start}-{end}"))
                    .header("Prefer", "count=exact"),
            )
            .await?;

        let total_count = response
            .header("content-range")
            .and_then(content_range_total)
            .map(|total| total as usize);

        Ok(PageData {
            page_data: response.json()?,
            total_count,
        })
    }
}
