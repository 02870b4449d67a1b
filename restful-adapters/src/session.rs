//! Strapi users-permissions: the signed-in session and the user list.

use async_trait::async_trait;
use restful_client::{ClientConfig, FormPart, HttpClient, RestClient, RestRequest};
use restful_model::{
    BaseModel, InvalidError, InvalidMessage, ItemResource, ModelError, ModelResult, PageResource,
    Record, Status,
};
use restful_persist::{KvStore, Observable, Persistor};
use restful_types::{ItemId, PageData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::qs;
use crate::strapi::StrapiResource;

/// OAuth providers Strapi can sign in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Auth0,
    Cognito,
    Cas,
    Discord,
    Facebook,
    Github,
    Google,
    Instagram,
    Keycloak,
    Linkedin,
    Patreon,
    Reddit,
    Twitch,
    Twitter,
    Vk,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Auth0 => "auth0",
            OAuthProvider::Cognito => "cognito",
            OAuthProvider::Cas => "cas",
            OAuthProvider::Discord => "discord",
            OAuthProvider::Facebook => "facebook",
            OAuthProvider::Github => "github",
            OAuthProvider::Google => "google",
            OAuthProvider::Instagram => "instagram",
            OAuthProvider::Keycloak => "keycloak",
            OAuthProvider::Linkedin => "linkedin",
            OAuthProvider::Patreon => "patreon",
            OAuthProvider::Reddit => "reddit",
            OAuthProvider::Twitch => "twitch",
            OAuthProvider::Twitter => "twitter",
            OAuthProvider::Vk => "vk",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file stored by the upload plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Media {
    pub id: i64,
    pub document_id: Option<String>,
    pub name: String,
    pub alternative_text: Option<String>,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub hash: String,
    pub ext: String,
    pub mime: String,
    /// Kilobytes.
    pub size: f64,
    pub url: String,
    pub preview_url: Option<String>,
    pub provider: String,
    pub formats: Option<Value>,
}

/// A file to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Strapi API root, e.g. `http://localhost:1337/api/`.
    pub base_uri: String,
    /// Store key of the persisted session fields.
    pub store_key: String,
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:1337/api/".to_string(),
            store_key: "Session".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize)]
struct SignIn<U> {
    jwt: String,
    user: U,
}

fn required(property: &str) -> ModelError {
    let constraints = BTreeMap::from([(
        "isNotEmpty".to_string(),
        format!("{property} should not be empty"),
    )]);
    InvalidError::from(InvalidMessage::from([(property.to_string(), constraints)])).into()
}

/// The signed-in Strapi user.
///
/// `access_token`, `jwt` and `session` are persisted under
/// `{store_key}-{field}`. The client sends the `jwt` as bearer token once
/// it is restored or signed in, so resources built on [`Self::client`]
/// act as the signed-in user.
pub struct StrapiSession<U: Record = Value> {
    client: Arc<HttpClient>,
    persistor: Persistor,
    pub base: BaseModel,
    /// Provider token exchanged for a `jwt` on sign-in.
    pub access_token: Observable<Option<String>>,
    pub jwt: Observable<String>,
    /// Profile of the signed-in user.
    pub session: Observable<Option<U>>,
}

impl<U: Record> StrapiSession<U> {
    /// Creates a signed-out session. Call [`Self::restore`] to load a
    /// stored one.
    pub fn new(store: Arc<dyn KvStore>, config: SessionConfig) -> ModelResult<Self> {
        let mut client_config = ClientConfig {
            base_uri: config.base_uri,
            timeout_secs: config.timeout_secs,
            ..Default::default()
        };
        client_config
            .default_headers
            .insert("Strapi-Response-Format".to_string(), "v4".to_string());
        let client = Arc::new(HttpClient::new(client_config)?);

        let access_token = Observable::new(None);
        let jwt = Observable::new(String::new());
        let session = Observable::new(None);

        let persistor = Persistor::new(store, config.store_key)
            .field("accessToken", &access_token)
            .field("jwt", &jwt)
            .field("session", &session);

        Ok(Self {
            client,
            persistor,
            base: BaseModel::new(),
            access_token,
            jwt,
            session,
        })
    }

    /// Creates a session and restores the stored one.
    pub async fn open(store: Arc<dyn KvStore>, config: SessionConfig) -> ModelResult<Self> {
        let session = Self::new(store, config)?;
        session.restore().await?;
        Ok(session)
    }

    /// Loads the stored fields, starts saving changes and authorizes the
    /// client with the stored `jwt`.
    pub async fn restore(&self) -> ModelResult<Vec<String>> {
        let restored = self.persistor.restore().await?;
        self.authorize().await;
        Ok(restored)
    }

    async fn authorize(&self) {
        let jwt = self.jwt.get();

        if jwt.is_empty() {
            self.client.clear_token().await;
        } else {
            self.client.set_token(jwt).await;
        }
    }

    /// The client carrying this session's `jwt`.
    pub fn client(&self) -> Arc<HttpClient> {
        Arc::clone(&self.client)
    }

    pub fn is_signed_in(&self) -> bool {
        !self.jwt.with(String::is_empty)
    }

    /// Where a browser starts signing in with `provider`.
    pub fn o_auth_link_of(&self, provider: OAuthProvider) -> String {
        self.client.resolve(&format!("connect/{provider}"))
    }

    /// Exchanges a provider access token for a `jwt`, then loads the
    /// profile. `token` defaults to the stored `access_token`.
    pub async fn sign_in_oauth(
        &self,
        token: Option<&str>,
        provider: OAuthProvider,
    ) -> ModelResult<Option<U>> {
        let _uploading = self.base.toggle(Status::Uploading);

        let token = match token {
            Some(token) => token.to_string(),
            None => self.access_token.get().unwrap_or_default(),
        };
        if token.is_empty() {
            return Err(required("accessToken"));
        }
        let request = RestRequest::get(format!("auth/{provider}/callback"))
            .query([("access_token", token.as_str())]);

        let SignIn { jwt, user } = self.client.send(request).await?.json()?;

        self.access_token.set(Some(token));
        self.jwt.set(jwt);
        self.session.set(Some(user));
        self.authorize().await;
        info!("Signed in through {}", provider);

        self.get_session().await
    }

    /// Loads the signed-in user's profile, `None` when anonymous.
    pub async fn get_session(&self) -> ModelResult<Option<U>> {
        self.get_profile(None).await
    }

    /// Loads the profile of user `id` (`me` by default) into `session`.
    ///
    /// Strapi answers `400` for `users/me` without a valid `jwt`; that
    /// yields `None` and leaves `session` alone.
    pub async fn get_profile(&self, id: Option<&ItemId>) -> ModelResult<Option<U>> {
        let _downloading = self.base.toggle(Status::Downloading);

        let path = match id {
            Some(id) => format!("users/{id}"),
            None => "users/me".to_string(),
        };
        match self.client.send(RestRequest::get(path)).await {
            Ok(response) => {
                let user: U = response.json()?;
                self.session.set(Some(user.clone()));
                Ok(Some(user))
            }
            Err(e) if e.status() == Some(400) => {
                debug!("No profile: {}", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn session_id(&self) -> Option<ItemId> {
        self.session
            .with(|session| session.as_ref().and_then(|user| ItemId::of(user, "id")))
    }

    /// Saves profile fields of the user `data.id`, the signed-in user by
    /// default.
    pub async fn update_profile(&self, data: &Value) -> ModelResult<U> {
        let _uploading = self.base.toggle(Status::Uploading);

        let mut fields = match data {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        let id = fields
            .remove("id")
            .as_ref()
            .and_then(ItemId::from_value)
            .or_else(|| self.session_id())
            .ok_or_else(|| required("id"))?;

        let request = RestRequest::put(format!("users/{id}")).json_value(Value::Object(fields));
        let user: U = self.client.send(request).await?.json()?;

        self.session.set(Some(user.clone()));
        Ok(user)
    }

    /// Uploads `files` into the media `field` of record `id` of the
    /// content type `model`, e.g. `api::article.article`.
    pub async fn upload(
        &self,
        model: &str,
        id: &ItemId,
        field: &str,
        files: Vec<UploadFile>,
        source: Option<&str>,
    ) -> ModelResult<Vec<Media>> {
        let _uploading = self.base.toggle(Status::Uploading);

        let mut parts = vec![
            FormPart::text("ref", model),
            FormPart::text("refId", id.to_string()),
            FormPart::text("field", field),
        ];
        if let Some(source) = source {
            parts.push(FormPart::text("source", source));
        }
        parts.extend(files.into_iter().map(|file| FormPart::File {
            name: "files".to_string(),
            file_name: file.name,
            mime: file.mime,
            bytes: file.bytes,
        }));

        let body: Value = self
            .client
            .send(RestRequest::post("upload").multipart(parts))
            .await?
            .json()?;

        Ok(match body {
            items @ Value::Array(_) => serde_json::from_value(items)?,
            one => vec![serde_json::from_value(one)?],
        })
    }

    /// Forgets the session, in memory and in the store.
    pub async fn sign_out(&self) -> ModelResult<()> {
        self.access_token.set(None);
        self.jwt.set(String::new());
        self.session.set(None);

        self.authorize().await;
        self.persistor.flush().await?;
        Ok(())
    }
}

impl<U: Record> fmt::Debug for StrapiSession<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrapiSession")
            .field("store_key", &self.persistor.store_key())
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}

/// The users-permissions `users` collection.
///
/// Users come back bare, without the `{ data }` envelope of content
/// types, and the total is read from `users/count`.
pub struct StrapiUsers<D> {
    resource: StrapiResource<D>,
}

impl<D> StrapiUsers<D> {
    pub fn new(client: Arc<dyn RestClient>) -> Self {
        Self::from_resource(StrapiResource::new(client, "users"))
    }

    /// Wraps a configured resource, e.g. one with search keys.
    pub fn from_resource(resource: StrapiResource<D>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &StrapiResource<D> {
        &self.resource
    }
}

#[async_trait]
impl<D: Record> ItemResource<D> for StrapiUsers<D> {
    fn client(&self) -> &dyn RestClient {
        self.resource.client()
    }

    fn base_uri(&self) -> &str {
        self.resource.base_uri()
    }

    fn index_key(&self) -> &str {
        self.resource.index_key()
    }
}

#[async_trait]
impl<D: Record, F: Record> PageResource<D, F> for StrapiUsers<D> {
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
        let query = qs::pairs(&self.resource.make_filter(page_index, page_size, &filter));
        let base_uri = self.base_uri().trim_end_matches('/');
        debug!("Loading users page {} of {}", page_index, base_uri);

        let count = RestRequest::get(format!("{base_uri}/count")).query(query.clone());
        let list = RestRequest::get(base_uri.to_string()).query(query);

        let client = self.client();
        let (count, list) = futures::try_join!(client.send(count), client.send(list))?;

        Ok(PageData {
            page_data: list.json()?,
            total_count: Some(count.json()?),
        })
    }
}
