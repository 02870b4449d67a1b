mod common;

use common::{client_for, eventually, Repository};
use pretty_assertions::assert_eq;
use restful_client::RestClient;
use restful_model::{
    BaseModel, InvalidMessage, ItemModel, ItemResource, ModelError, Status, Validate, Violations,
};
use restful_types::ItemId;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Repositories {
    client: Arc<dyn RestClient>,
}

impl ItemResource<Repository> for Repositories {
    fn client(&self) -> &dyn RestClient {
        &*self.client
    }

    fn base_uri(&self) -> &str {
        "repos"
    }
}

fn repository_model(server: &MockServer) -> ItemModel<Repository> {
    ItemModel::new(Repositories {
        client: client_for(server),
    })
}

// ── Status counters ─────────────────────────────────────────────

#[test]
fn toggle_guards_stack() {
    let model = BaseModel::new();
    assert_eq!(model.downloading.get(), 0);

    let first = model.toggle(Status::Downloading);
    assert_eq!(model.downloading.get(), 1);

    let second = model.toggle(Status::Downloading);
    assert_eq!(model.downloading.get(), 2);
    assert_eq!(model.uploading.get(), 0);

    drop(first);
    assert_eq!(model.downloading.get(), 1);

    drop(second);
    assert_eq!(model.downloading.get(), 0);
}

#[tokio::test]
async fn overlapping_loads_count_downloading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/idea2app/MobX-RESTful"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({ "id": 1, "full_name": "idea2app/MobX-RESTful" })),
        )
        .mount(&server)
        .await;
    let model = repository_model(&server);

    let spawn_load = |model: ItemModel<Repository>| {
        tokio::spawn(async move {
            model
                .get_one(&ItemId::from("idea2app/MobX-RESTful"))
                .await
        })
    };
    let first = spawn_load(model.clone());
    let second = spawn_load(model.clone());

    eventually(|| {
        let downloading = model.base.downloading.get();
        async move { downloading == 2 }
    })
    .await;

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(model.base.downloading.get(), 0);
}

// ── Item requests ───────────────────────────────────────────────

#[tokio::test]
async fn get_one_sets_current_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/idea2app/MobX-RESTful"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "full_name": "idea2app/MobX-RESTful",
            "private": false
        })))
        .mount(&server)
        .await;
    let model = repository_model(&server);

    let detail = model
        .get_one(&ItemId::from("idea2app/MobX-RESTful"))
        .await
        .unwrap();

    assert_eq!(detail.full_name, "idea2app/MobX-RESTful");
    assert_eq!(model.current_one.get(), Some(detail));
}

#[tokio::test]
async fn update_one_posts_without_id_and_puts_with_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos"))
        .and(body_json(json!({ "full_name": "idea2app/new" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": 7, "full_name": "idea2app/new" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "full_name": "idea2app/old" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    let model = repository_model(&server);

    #[derive(Serialize)]
    struct NewRepository<'a> {
        full_name: &'a str,
    }

    let created = model
        .update_one(&NewRepository { full_name: "idea2app/new" }, None)
        .await
        .unwrap();
    assert_eq!(created.id, 7);

    let updated = model
        .update_one(&json!({ "full_name": "idea2app/old" }), Some(&ItemId::from(7)))
        .await
        .unwrap();
    assert_eq!(model.current_one.get(), Some(updated));
    assert_eq!(model.base.uploading.get(), 0);
}

#[tokio::test]
async fn delete_one_clears_current_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 7, "full_name": "idea2app/x" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let model = repository_model(&server);

    model.get_one(&ItemId::from(7)).await.unwrap();
    model.delete_one(&ItemId::from(7)).await.unwrap();

    assert_eq!(model.current_one.get(), None);
}

#[tokio::test]
async fn missing_item_surfaces_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;
    let model = repository_model(&server);

    let err = model.get_one(&ItemId::from(404)).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP 404: Not Found");
    assert_eq!(model.current_one.get(), None);
    assert_eq!(model.base.downloading.get(), 0);
}

// ── Validation ──────────────────────────────────────────────────

struct UserInput {
    username: String,
    email: String,
}

impl Validate for UserInput {
    fn validate(&self) -> Result<(), InvalidMessage> {
        Violations::default()
            .check(
                "username",
                "isNotEmpty",
                !self.username.is_empty(),
                "username should not be empty",
            )
            .check(
                "email",
                "isEmail",
                self.email.contains('@'),
                "email must be an email",
            )
            .check(
                "email",
                "maxLength",
                self.email.len() <= 8,
                "email must be shorter than or equal to 8 characters",
            )
            .finish()
    }
}

#[test]
fn validate_records_and_clears_validity() {
    let model = BaseModel::new();
    let invalid = UserInput {
        username: String::new(),
        email: "not-an-email".to_string(),
    };

    let err = model.validate(&invalid).unwrap_err();

    let ModelError::Invalid(invalid_error) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(
        invalid_error.to_string(),
        "email: email must be an email, email must be shorter than or equal to 8 characters\n\
         username: username should not be empty"
    );
    assert_eq!(
        std::error::Error::source(&err).map(ToString::to_string),
        Some(invalid_error.to_string())
    );
    assert_eq!(model.validity.with(|validity| validity.len()), 2);
    assert_eq!(
        model.validity.get()["username"]["isNotEmpty"],
        "username should not be empty"
    );

    let valid = UserInput {
        username: "alice".to_string(),
        email: "a@b.c".to_string(),
    };
    model.validate(&valid).unwrap();
    assert!(model.validity.get().is_empty());
}
