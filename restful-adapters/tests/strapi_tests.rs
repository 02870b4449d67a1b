use pretty_assertions::assert_eq;
use restful_adapters::{date_range, normalize, qs, SortOrder, StrapiResource};
use restful_client::{HttpClient, RestClient};
use restful_model::{ItemModel, ListModel};
use restful_types::{Filter, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Author {
    id: i64,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: i64,
    #[serde(rename = "documentId", default)]
    document_id: Option<String>,
    title: String,
    #[serde(default)]
    author: Option<Author>,
}

fn sorted_pairs(value: &Value) -> Vec<(String, String)> {
    let mut pairs = qs::pairs(value);
    pairs.sort_unstable();
    pairs
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn filter(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(fields) => fields,
        _ => panic!("filter must be an object"),
    }
}

fn articles(server: &MockServer) -> StrapiResource<Article> {
    let client: Arc<dyn RestClient> =
        Arc::new(HttpClient::with_base_uri(format!("{}/api/", server.uri())).unwrap());
    StrapiResource::new(client, "articles")
}

// ── Query strings ───────────────────────────────────────────────

#[test]
fn pairs_nest_brackets() {
    let pairs = sorted_pairs(&json!({
        "filters": { "title": { "$eq": "a b&c" } },
        "sort": ["title:asc", "id:desc"],
        "pagination": { "page": 2, "pageSize": 10 },
        "draft": null,
        "published": true,
        "empty": {}
    }));

    assert_eq!(
        pairs,
        vec![
            pair("draft", ""),
            pair("filters[title][$eq]", "a b&c"),
            pair("pagination[pageSize]", "10"),
            pair("pagination[page]", "2"),
            pair("published", "true"),
            pair("sort[0]", "title:asc"),
            pair("sort[1]", "id:desc"),
        ]
    );
}

#[test]
fn pairs_ignore_non_objects() {
    assert!(qs::pairs(&json!([1, 2])).is_empty());
    assert!(qs::pairs(&json!({})).is_empty());
}

// ── Date ranges ─────────────────────────────────────────────────

#[test]
fn date_range_covers_the_named_period() {
    assert_eq!(
        date_range("2024"),
        Some([
            "2024-01-01T00:00:00.000Z".to_string(),
            "2024-12-31T23:59:59.999Z".to_string()
        ])
    );
    assert_eq!(
        date_range("2024-02"),
        Some([
            "2024-02-01T00:00:00.000Z".to_string(),
            "2024-02-29T23:59:59.999Z".to_string()
        ])
    );
    assert_eq!(
        date_range("2023-12-31T08:00:00Z"),
        Some([
            "2023-12-31T00:00:00.000Z".to_string(),
            "2023-12-31T23:59:59.999Z".to_string()
        ])
    );
}

#[test]
fn date_range_rejects_invalid_dates() {
    assert_eq!(date_range("soon"), None);
    assert_eq!(date_range("2023-02-30"), None);
    assert_eq!(date_range("2023-13"), None);
    assert_eq!(date_range(""), None);
}

// ── Normalization ───────────────────────────────────────────────

#[test]
fn normalize_flattens_attributes_and_relations() {
    let item = json!({
        "id": 1,
        "documentId": "abc",
        "attributes": {
            "title": "Hello",
            "author": { "data": { "id": 9, "attributes": { "name": "Ann" } } },
            "tags": { "data": [{ "id": 2, "attributes": { "name": "rust" } }] },
            "cover": { "data": null },
            "meta": { "views": 3 }
        }
    });

    assert_eq!(
        normalize(item),
        json!({
            "id": 1,
            "documentId": "abc",
            "title": "Hello",
            "author": { "id": 9, "name": "Ann" },
            "tags": [{ "id": 2, "name": "rust" }],
            "cover": null,
            "meta": { "views": 3 }
        })
    );
}

#[test]
fn normalize_passes_flat_items_through() {
    let item = json!({ "id": 1, "documentId": "abc", "title": "Hello" });
    assert_eq!(normalize(item.clone()), item);
}

// ── Filters ─────────────────────────────────────────────────────

#[tokio::test]
async fn make_filter_maps_fields_by_kind() {
    let server = MockServer::start().await;
    let resource = articles(&server)
        .operator("title", "$containsi")
        .populate("author", json!({ "populate": "*" }))
        .date_keys(["publishedAt"])
        .sort("publishedAt", SortOrder::Desc);

    let query = resource.make_filter(
        2,
        20,
        &filter(json!({
            "title": "rust",
            "author": 9,
            "publishedAt": "2024-05",
            "views": 3,
            "draft": null
        })),
    );

    assert_eq!(
        query,
        json!({
            "populate": { "author": { "populate": "*" } },
            "filters": {
                "title": { "$containsi": "rust" },
                "author": { "id": { "$eq": 9 } },
                "publishedAt": {
                    "$between": ["2024-05-01T00:00:00.000Z", "2024-05-31T23:59:59.999Z"]
                },
                "views": { "$eq": 3 }
            },
            "sort": ["publishedAt:desc"],
            "pagination": { "page": 2, "pageSize": 20 }
        })
    );
}

#[tokio::test]
async fn keywords_search_every_key_for_every_word() {
    let server = MockServer::start().await;
    let resource = articles(&server).search_keys(["title", "summary"]);

    let query = resource.make_filter(
        1,
        10,
        &filter(json!({ "keywords": " rust  async ", "views": 3 })),
    );

    assert_eq!(
        query["filters"],
        json!({
            "$or": [
                { "title": { "$containsi": "rust" } },
                { "title": { "$containsi": "async" } },
                { "summary": { "$containsi": "rust" } },
                { "summary": { "$containsi": "async" } }
            ]
        })
    );
}

#[tokio::test]
async fn keywords_without_search_keys_are_ignored() {
    let server = MockServer::start().await;
    let query = articles(&server).make_filter(1, 10, &filter(json!({ "keywords": "rust" })));

    assert_eq!(query["filters"], json!({}));
}

// ── Requests ────────────────────────────────────────────────────

#[tokio::test]
async fn list_pages_through_strapi() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(query_param("filters[title][$eq]", "Hello"))
        .and(query_param("pagination[page]", "1"))
        .and(query_param("pagination[pageSize]", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": 1, "documentId": "a", "attributes": { "title": "Hello" } },
                { "id": 2, "documentId": "b", "attributes": { "title": "Hello" } }
            ],
            "meta": { "pagination": { "page": 1, "pageSize": 10, "pageCount": 3, "total": 25 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let list: ListModel<Article> = ListModel::new(articles(&server));
    let mut query = Filter::new();
    query.insert("title".to_string(), json!("Hello"));

    let page = list.get_list(Some(query), None, None).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[1].document_id.as_deref(), Some("b"));
    assert_eq!(list.total_count.get(), 25);
    assert_eq!(list.page_count(), 3);
    assert!(!list.no_more.get());
}

#[tokio::test]
async fn get_one_populates_and_unwraps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/articles/1"))
        .and(query_param("populate[author][populate]", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 1,
                "attributes": {
                    "title": "Hello",
                    "author": { "data": { "id": 9, "attributes": { "name": "Ann" } } }
                }
            },
            "meta": {}
        })))
        .mount(&server)
        .await;

    let model = ItemModel::new(articles(&server).populate("author", json!({ "populate": "*" })));
    let article = model.get_one(&ItemId::from(1)).await.unwrap();

    assert_eq!(
        article.author,
        Some(Author {
            id: 9,
            name: "Ann".to_string()
        })
    );
    assert_eq!(model.current_one.get(), Some(article));
}

#[tokio::test]
async fn update_one_wraps_data() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/articles/1"))
        .and(body_json(json!({ "data": { "title": "Renamed" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 1, "documentId": "a", "title": "Renamed" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/articles"))
        .and(body_json(json!({ "data": { "title": "New" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "id": 2, "documentId": "b", "title": "New" }
        })))
        .mount(&server)
        .await;
    let model = ItemModel::new(articles(&server));

    let renamed = model
        .update_one(&json!({ "title": "Renamed" }), Some(&ItemId::from(1)))
        .await
        .unwrap();
    assert_eq!(renamed.title, "Renamed");

    let created = model
        .update_one(&json!({ "title": "New" }), None)
        .await
        .unwrap();
    assert_eq!(created.id, 2);
}
