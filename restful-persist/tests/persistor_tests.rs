mod common;

use common::wait_for_value;
use pretty_assertions::assert_eq;
use restful_persist::{
    FnCodec, KvStore, MemoryStore, Observable, PersistBox, PersistError, PersistOptions,
    Persistor,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// A model with three persisted fields, like a session store.
struct TestModel {
    name: Observable<Option<String>>,
    file: Observable<String>,
    token: Observable<String>,
    persistor: Persistor,
}

impl TestModel {
    fn new(store: Arc<dyn KvStore>) -> Self {
        let name = Observable::new(None);
        let file = Observable::new(String::new());
        let token = Observable::new(String::new());

        // The file is stored as a byte array, like a blob.
        let bytes = FnCodec::new(
            |text: &String| Ok(json!(text.as_bytes())),
            |stored: Value| {
                let bytes: Vec<u8> = serde_json::from_value(stored)?;
                String::from_utf8(bytes).map_err(|e| PersistError::Codec {
                    key: "file".to_string(),
                    message: e.to_string(),
                })
            },
        );

        let persistor = Persistor::new(store, "Test")
            .field("name", &name)
            .field_with("file", &file, PersistOptions::with_codec(bytes))
            .field_with(
                "token",
                &token,
                PersistOptions::default().expire_in(Duration::from_secs(1)),
            );

        Self {
            name,
            file,
            token,
            persistor,
        }
    }
}

#[tokio::test]
async fn saves_a_field_on_change() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    model.name.set(Some("Test".to_string()));
    wait_for_value(&*store, "Test-name", Some(json!({ "value": "Test", "expireAt": null }))).await;

    model.name.set(Some("Example".to_string()));
    wait_for_value(&*store, "Test-name", Some(json!({ "value": "Example", "expireAt": null }))).await;
}

#[tokio::test]
async fn restores_a_field_into_a_new_instance() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    model.name.set(Some("Example".to_string()));
    wait_for_value(&*store, "Test-name", Some(json!({ "value": "Example", "expireAt": null }))).await;

    let fresh = TestModel::new(store.clone());
    assert_eq!(fresh.name.get(), None);

    let restored = fresh.persistor.restore().await.unwrap();
    assert_eq!(restored, vec!["name".to_string()]);
    assert_eq!(fresh.name.get().as_deref(), Some("Example"));
}

#[tokio::test]
async fn restore_does_not_write_back_restored_values() {
    let store = Arc::new(MemoryStore::new());
    store
        .set("Test-name", json!({ "value": "Kept", "expireAt": null }))
        .await
        .unwrap();

    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.keys().await.unwrap(), vec!["Test-name".to_string()]);
}

#[tokio::test]
async fn writes_and_reads_through_a_codec() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    model.file.set("Test".to_string());
    wait_for_value(
        &*store,
        "Test-file",
        Some(json!({ "value": [84, 101, 115, 116], "expireAt": null })),
    )
    .await;

    let fresh = TestModel::new(store.clone());
    fresh.persistor.restore().await.unwrap();
    assert_eq!(fresh.file.get(), "Test");
}

#[tokio::test]
async fn expiring_field_carries_expire_at() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    model.token.set("xyz".to_string());
    for _ in 0..200 {
        if store.get("Test-token").await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let stored: PersistBox =
        serde_json::from_value(store.get("Test-token").await.unwrap().unwrap()).unwrap();
    assert_eq!(stored.value, json!("xyz"));
    let expire_at = stored.expire_at.unwrap();
    assert!(expire_at > restful_types::now_millis());
}

#[tokio::test]
async fn deletes_an_expired_field_on_restore() {
    let store = Arc::new(MemoryStore::new());
    let past = restful_types::now_millis() - 1_000;
    store
        .set("Test-token", json!({ "value": "xyz", "expireAt": past }))
        .await
        .unwrap();

    let model = TestModel::new(store.clone());
    let restored = model.persistor.restore().await.unwrap();

    assert!(restored.is_empty());
    assert_eq!(model.token.get(), "");
    assert_eq!(store.get("Test-token").await.unwrap(), None);
}

#[tokio::test]
async fn discards_malformed_entries() {
    let store = Arc::new(MemoryStore::new());
    store.set("Test-name", json!("not a box")).await.unwrap();

    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    assert_eq!(model.name.get(), None);
    assert_eq!(store.get("Test-name").await.unwrap(), None);
}

#[tokio::test]
async fn destroy_deletes_values_and_stops_reactions() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();

    model.name.set(Some("Test".to_string()));
    wait_for_value(&*store, "Test-name", Some(json!({ "value": "Test", "expireAt": null }))).await;

    model.persistor.destroy().await.unwrap();
    assert_eq!(store.get("Test-name").await.unwrap(), None);

    model.name.set(Some("Again".to_string()));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(store.get("Test-name").await.unwrap(), None);
}

#[tokio::test]
async fn flush_saves_current_values() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.file.set("draft".to_string());

    model.persistor.flush().await.unwrap();

    assert!(store.get("Test-file").await.unwrap().is_some());
    assert_eq!(
        store.get("Test-name").await.unwrap(),
        Some(json!({ "value": null, "expireAt": null }))
    );
}

#[tokio::test]
async fn restore_twice_keeps_one_reaction_per_field() {
    let store = Arc::new(MemoryStore::new());
    let model = TestModel::new(store.clone());
    model.persistor.restore().await.unwrap();
    model.persistor.restore().await.unwrap();

    model.name.set(Some("Once".to_string()));
    wait_for_value(&*store, "Test-name", Some(json!({ "value": "Once", "expireAt": null }))).await;
}

#[test]
fn persistor_reports_keys() {
    let field = Observable::new(0u32);
    let persistor = Persistor::new(Arc::new(MemoryStore::new()), "Counter").field("count", &field);

    assert_eq!(persistor.store_key(), "Counter");
    assert_eq!(persistor.field_keys(), vec!["count"]);
    assert_eq!(persistor.storage_key("count"), "Counter-count");
    assert!(format!("{persistor:?}").contains("Counter"));
}

#[test]
fn persist_box_expiry() {
    let never = PersistBox {
        value: json!(1),
        expire_at: None,
    };
    assert!(!never.is_expired(i64::MAX));

    let soon = PersistBox {
        value: json!(1),
        expire_at: Some(100),
    };
    assert!(!soon.is_expired(100));
    assert!(soon.is_expired(101));
}
