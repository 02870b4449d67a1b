//! reqwest-backed implementation of [`RestClient`].

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::request::{FormPart, HttpMethod, RestRequest, RestResponse};
use crate::{ByteStream, RestClient};

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URI every relative request path is resolved against.
    pub base_uri: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Headers sent with every request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:1337/".to_string(),
            timeout_secs: 30,
            user_agent: concat!("restful-models/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// HTTP client for JSON REST APIs.
///
/// Holds an optional bearer token which is attached to every request,
/// so models sharing one client share one session.
#[derive(Clone)]
pub struct HttpClient {
    config: ClientConfig,
    client: Client,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpClient {
    /// Creates a client from its configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Creates a client for `base_uri` with default settings.
    pub fn with_base_uri(base_uri: impl Into<String>) -> ClientResult<Self> {
        Self::new(ClientConfig {
            base_uri: base_uri.into(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sets the bearer token sent as `Authorization`.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Drops the bearer token.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Resolves a request path against the base URI.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_uri.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        match (base.is_empty(), path.is_empty()) {
            (true, _) => path.to_string(),
            (false, true) => base.to_string(),
            (false, false) => format!("{base}/{path}"),
        }
    }

    async fn builder(&self, method: HttpMethod, path: &str) -> reqwest::RequestBuilder {
        let method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self.client.request(method, self.resolve(path));

        for (name, value) in &self.config.default_headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = self.token.read().await.as_ref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait]
impl RestClient for HttpClient {
    fn base_uri(&self) -> &str {
        &self.config.base_uri
    }

    async fn send(&self, request: RestRequest) -> ClientResult<RestResponse> {
        debug!("{} {}", request.method, request.path);

        let mut builder = self.builder(request.method, &request.path).await;

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.form.is_empty() {
            builder = builder.multipart(form_of(request.form)?);
        } else if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ClientError::from_response(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        Ok(RestResponse {
            status: status.as_u16(),
            headers,
            body: body.to_vec(),
        })
    }

    async fn download(&self, path: &str, offset: u64) -> ClientResult<ByteStream> {
        debug!("GET {} (from byte {})", path, offset);

        let mut builder = self.builder(HttpMethod::Get, path).await;

        if offset > 0 {
            builder = builder.header("Range", format!("bytes={offset}-"));
        }
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &text));
        }

        // A server ignoring `Range` answers 200 with the whole file.
        let (offset, total) = if status == StatusCode::PARTIAL_CONTENT {
            let total = response
                .headers()
                .get("content-range")
                .and_then(|value| value.to_str().ok())
                .and_then(content_range_total)
                .or_else(|| response.content_length().map(|length| offset + length));
            (offset, total)
        } else {
            (0, response.content_length())
        };

        let chunks = stream::try_unfold(response, |mut response| async move {
            let chunk = response.chunk().await.map_err(ClientError::from)?;
            Ok::<_, ClientError>(chunk.map(|bytes| (bytes.to_vec(), response)))
        })
        .boxed();

        Ok(ByteStream {
            offset,
            total,
            chunks,
        })
    }
}

fn form_of(parts: Vec<FormPart>) -> ClientResult<Form> {
    let mut form = Form::new();

    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = mime {
                    file = file.mime_str(&mime)?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

/// Reads the full length out of `Content-Range: bytes a-b/total`.
pub fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
