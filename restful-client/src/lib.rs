//! HTTP transport seam for restful-models.
//!
//! Models never talk to an HTTP library directly. They hold an
//! `Arc<dyn RestClient>` and exchange [`RestRequest`] / [`RestResponse`]
//! values with it, so a backend adapter or a test double can stand in
//! for the network.
//!
//! [`HttpClient`] is the reqwest implementation used in production.
//!
//! # Example
//!
//! ```no_run
//! use restful_client::{HttpClient, RestClient, RestRequest};
//!
//! # async fn example() -> restful_client::ClientResult<()> {
//! let client = HttpClient::with_base_uri("https://api.github.com/")?;
//! let repo: serde_json::Value = client
//!     .send(RestRequest::get("repos/idea2app/MobX-RESTful"))
//!     .await?
//!     .json()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod http;
mod request;

pub use error::{ClientError, ClientResult};
pub use http::{content_range_total, ClientConfig, HttpClient};
pub use request::{FormPart, HttpMethod, RestRequest, RestResponse};

use async_trait::async_trait;
use futures::stream::BoxStream;

/// A byte stream of a (possibly resumed) download.
pub struct ByteStream {
    /// Offset of the first streamed byte within the whole resource.
    pub offset: u64,
    /// Size of the whole resource, when known.
    pub total: Option<u64>,
    pub chunks: BoxStream<'static, ClientResult<Vec<u8>>>,
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("offset", &self.offset)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// Abstract REST transport.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Base URI relative request paths are resolved against.
    fn base_uri(&self) -> &str;

    /// Sends a request. Non-success statuses come back as
    /// [`ClientError::Http`].
    async fn send(&self, request: RestRequest) -> ClientResult<RestResponse>;

    /// Opens a byte stream of `path` starting at `offset`.
    async fn download(&self, path: &str, offset: u64) -> ClientResult<ByteStream>;
}
