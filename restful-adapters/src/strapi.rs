//! Strapi (v4/v5) REST resources.
//!
//! Strapi wraps records as `{ id, documentId, attributes }` inside
//! `{ data, meta }` envelopes and filters through bracketed query objects
//! (`filters[name][$eq]=x`). [`StrapiResource`] translates both ways so list
//! models see plain records.

use async_trait::async_trait;
use chrono::{Months, NaiveDate, NaiveDateTime, TimeDelta};
use restful_client::{RestClient, RestRequest};
use restful_model::{ItemResource, ModelResult, PageResource, Record};
use restful_types::{ItemId, PageData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::qs;

/// Filter field switching a list to keyword search.
pub const KEYWORDS: &str = "keywords";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query options of a Strapi collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrapiConfig {
    pub index_key: String,
    /// Filter operator per field; `$eq` when absent.
    pub operator: Map<String, Value>,
    /// Sort fields in priority order.
    pub sort: Vec<(String, SortOrder)>,
    /// Relations to populate; filters on these match the related index key.
    pub populate: Map<String, Value>,
    /// Fields filtered by the date range a partial date covers.
    pub date_keys: Vec<String>,
    /// Fields searched by the `keywords` filter.
    pub search_keys: Vec<String>,
}

impl Default for StrapiConfig {
    fn default() -> Self {
        Self {
            index_key: "id".to_string(),
            operator: Map::new(),
            sort: Vec::new(),
            populate: Map::new(),
            date_keys: Vec::new(),
            search_keys: Vec::new(),
        }
    }
}

/// A Strapi collection, e.g. `articles`.
pub struct StrapiResource<D> {
    client: Arc<dyn RestClient>,
    base_uri: String,
    config: StrapiConfig,
    _record: PhantomData<fn() -> D>,
}

impl<D> StrapiResource<D> {
    pub fn new(client: Arc<dyn RestClient>, base_uri: impl Into<String>) -> Self {
        Self::with_config(client, base_uri, StrapiConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn RestClient>,
        base_uri: impl Into<String>,
        config: StrapiConfig,
    ) -> Self {
        Self {
            client,
            base_uri: base_uri.into(),
            config,
            _record: PhantomData,
        }
    }

    pub fn config(&self) -> &StrapiConfig {
        &self.config
    }

    #[must_use]
    pub fn operator(mut self, key: impl Into<String>, operator: impl Into<String>) -> Self {
        self.config
            .operator
            .insert(key.into(), Value::String(operator.into()));
        self
    }

    #[must_use]
    pub fn sort(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.config.sort.push((key.into(), order));
        self
    }

    /// Populates a relation, e.g. `populate("author", json!({ "populate": "*" }))`.
    #[must_use]
    pub fn populate(mut self, key: impl Into<String>, query: Value) -> Self {
        self.config.populate.insert(key.into(), query);
        self
    }

    #[must_use]
    pub fn date_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.date_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn search_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.search_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the query object of one page.
    ///
    /// A non-empty `keywords` field searches every search key for every
    /// word and ignores the other fields.
    pub fn make_filter(&self, page_index: usize, page_size: usize, filter: &Map<String, Value>) -> Value {
        let keywords = filter
            .get(KEYWORDS)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|keywords| !keywords.is_empty() && !self.config.search_keys.is_empty());

        let filters = match keywords {
            Some(keywords) => self.search_filter(keywords),
            None => Value::Object(
                filter
                    .iter()
                    .filter(|(key, value)| key.as_str() != KEYWORDS && !value.is_null())
                    .map(|(key, value)| (key.clone(), self.field_filter(key, value)))
                    .collect(),
            ),
        };

        let mut query = Map::new();
        if !self.config.populate.is_empty() {
            query.insert("populate".to_string(), Value::Object(self.config.populate.clone()));
        }
        query.insert("filters".to_string(), filters);

        if !self.config.sort.is_empty() {
            let sort = self
                .config
                .sort
                .iter()
                .map(|(key, order)| Value::String(format!("{key}:{}", order.as_str())))
                .collect();
            query.insert("sort".to_string(), Value::Array(sort));
        }
        query.insert(
            "pagination".to_string(),
            json!({ "page": page_index, "pageSize": page_size }),
        );
        Value::Object(query)
    }

    fn field_filter(&self, key: &str, value: &Value) -> Value {
        if self.config.populate.contains_key(key) {
            let mut relation = Map::new();
            relation.insert(self.config.index_key.clone(), json!({ "$eq": value }));
            return Value::Object(relation);
        }
        if self.config.date_keys.iter().any(|date_key| date_key == key) {
            let range = value.as_str().and_then(date_range);

            if let Some([start, end]) = range {
                return json!({ "$between": [start, end] });
            }
        }
        let operator = self
            .config
            .operator
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("$eq");

        let mut condition = Map::new();
        condition.insert(operator.to_string(), value.clone());
        Value::Object(condition)
    }

    fn search_filter(&self, keywords: &str) -> Value {
        let words: Vec<&str> = keywords.split_whitespace().collect();

        let conditions: Vec<Value> = self
            .config
            .search_keys
            .iter()
            .flat_map(|key| {
                words.iter().map(move |word| {
                    let mut condition = Map::new();
                    condition.insert(key.clone(), json!({ "$containsi": word }));
                    Value::Object(condition)
                })
            })
            .collect();

        json!({ "$or": conditions })
    }

    fn populate_query(&self) -> Vec<(String, String)> {
        if self.config.populate.is_empty() {
            return Vec::new();
        }
        qs::pairs(&json!({ "populate": self.config.populate }))
    }
}

/// Flattens Strapi v4 `{ id, documentId, attributes }` items, recursing
/// into `{ data }` relation wrappers. Flat (v5) items pass through.
pub fn normalize(item: Value) -> Value {
    let Value::Object(mut fields) = item else {
        return item;
    };
    let Some(Value::Object(attributes)) = fields.remove("attributes") else {
        return Value::Object(fields);
    };

    let mut data = Map::new();
    for key in ["id", "documentId"] {
        if let Some(value) = fields.remove(key) {
            data.insert(key.to_string(), value);
        }
    }
    for (key, value) in attributes {
        data.insert(key, unwrap_relation(value));
    }
    Value::Object(data)
}

fn unwrap_relation(value: Value) -> Value {
    match value {
        Value::Object(mut wrapper) if wrapper.contains_key("data") => {
            match wrapper.remove("data").unwrap_or(Value::Null) {
                Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
                Value::Null => Value::Null,
                item => normalize(item),
            }
        }
        other => other,
    }
}

/// `$between` bounds of the period a partial date names: `2024`,
/// `2024-02` or `2024-02-29`. The end is the last millisecond of the
/// period.
pub fn date_range(value: &str) -> Option<[String; 2]> {
    let date = value.trim().split('T').next().unwrap_or_default();
    let parts: Vec<u32> = date
        .split('-')
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;

    let (start, next) = match *parts.as_slice() {
        [year] => {
            let start = NaiveDate::from_ymd_opt(year as i32, 1, 1)?;
            (start, start.checked_add_months(Months::new(12))?)
        }
        [year, month] => {
            let start = NaiveDate::from_ymd_opt(year as i32, month, 1)?;
            (start, start.checked_add_months(Months::new(1))?)
        }
        [year, month, day] => {
            let start = NaiveDate::from_ymd_opt(year as i32, month, day)?;
            (start, start.succ_opt()?)
        }
        _ => return None,
    };
    let start = start.and_hms_opt(0, 0, 0)?;
    let end = next.and_hms_opt(0, 0, 0)? - TimeDelta::milliseconds(1);

    Some([format_time(start), format_time(end)])
}

fn format_time(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn data_of(body: Value) -> Value {
    match body {
        Value::Object(mut envelope) => envelope.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[async_trait]
impl<D: Record> ItemResource<D> for StrapiResource<D> {
    fn client(&self) -> &dyn RestClient {
        &*self.client
    }

    fn base_uri(&self) -> &str {
        &self.base_uri
    }

    fn index_key(&self) -> &str {
        &self.config.index_key
    }

    async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        let request = RestRequest::get(self.item_path(id)).query(self.populate_query());

        let body: Value = self.client.send(request).await?.json()?;
        Ok(serde_json::from_value(normalize(data_of(body)))?)
    }

    async fn update_one(&self, data: &Value, id: Option<&ItemId>) -> ModelResult<D> {
        let request = match id {
            Some(id) => RestRequest::put(self.item_path(id)),
            None => RestRequest::post(self.base_uri.clone()),
        };
        let request = request.json_value(json!({ "data": data }));

        let body: Value = self.client.send(request).await?.json()?;
        Ok(serde_json::from_value(normalize(data_of(body)))?)
    }
}

#[async_trait]
impl<D: Record, F: Record> PageResource<D, F> for StrapiResource<D> {
    async fn load_page(
        &self,
        page_index: usize,
        page_size: usize,
        filter: &F,
    ) -> ModelResult<PageData<D>> {
        let filter = match serde_json::to_value(filter)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let query = qs::pairs(&self.make_filter(page_index, page_size, &filter));
        debug!("Loading Strapi page {} of {}", page_index, self.base_uri);

        let request = RestRequest::get(self.base_uri.clone()).query(query);
        let body: Value = self.client.send(request).await?.json()?;

        let total_count = body
            .pointer("/meta/pagination/total")
            .and_then(Value::as_u64)
            .map(|total| total as usize);
        let items = match data_of(body) {
            Value::Array(items) => items.into_iter().map(normalize).collect(),
            _ => Vec::new(),
        };

        Ok(PageData {
            page_data: serde_json::from_value(Value::Array(items))?,
            total_count,
        })
    }
}
