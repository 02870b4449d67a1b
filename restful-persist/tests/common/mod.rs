use restful_persist::KvStore;
use serde_json::Value;
use std::time::Duration;

/// Polls `key` until it holds `expected`, letting background reactions run.
pub async fn wait_for_value(store: &dyn KvStore, key: &str, expected: Option<Value>) {
    for _ in 0..200 {
        if store.get(key).await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "{key} never became {expected:?}, last value {:?}",
        store.get(key).await.unwrap()
    );
}
