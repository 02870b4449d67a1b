//! Protocol-specific byte sources of download tasks.

use async_trait::async_trait;
use restful_client::{ByteStream, ClientConfig, HttpClient, RestClient};
use std::sync::Arc;

use crate::error::DownloadResult;

/// Opens the bytes of a URI, starting at an offset.
///
/// A transport that cannot resume answers with a stream whose `offset` is
/// `0`; the task then rewrites the file from the start.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    async fn open(&self, uri: &str, offset: u64) -> DownloadResult<ByteStream>;
}

/// `http`/`https` transport over a [`RestClient`].
pub struct HttpTransport {
    client: Arc<dyn RestClient>,
}

impl HttpTransport {
    pub fn new(client: Arc<dyn RestClient>) -> Self {
        Self { client }
    }

    /// Transport over a fresh client for absolute URIs.
    pub fn with_timeout(timeout_secs: u64) -> DownloadResult<Self> {
        let client = HttpClient::new(ClientConfig {
            base_uri: String::new(),
            timeout_secs,
            ..Default::default()
        })?;
        Ok(Self::new(Arc::new(client)))
    }
}

#[async_trait]
impl TaskTransport for HttpTransport {
    async fn open(&self, uri: &str, offset: u64) -> DownloadResult<ByteStream> {
        Ok(self.client.download(uri, offset).await?)
    }
}
