#![allow(dead_code)]

use restful_client::{HttpClient, RestClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub full_name: String,
}

pub fn repository(id: i64) -> Repository {
    Repository {
        id,
        full_name: format!("idea2app/repo-{id}"),
    }
}

/// JSON bodies of repositories `ids`.
pub fn repositories(ids: std::ops::RangeInclusive<i64>) -> Value {
    json!(ids.map(repository).collect::<Vec<_>>())
}

pub fn client_for(server: &MockServer) -> Arc<dyn RestClient> {
    Arc::new(HttpClient::with_base_uri(format!("{}/", server.uri())).unwrap())
}

/// Polls `check` until it holds, failing after about a second.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}
