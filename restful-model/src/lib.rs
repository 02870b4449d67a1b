//! Observable item and list models over REST resources.
//!
//! A model maps one backend resource to observable fields a UI can watch:
//!
//! - [`ItemModel`]: one record at a time (`get_one`, `update_one`, `delete_one`)
//! - [`ListModel`]: paginated records with a page cache, regrouped when the
//!   page size changes, persistable through [`ListModel::persist_list`]
//! - [`BufferListModel`]: a list that prefetches the next page
//! - [`StreamListModel`]: a list cut from one continuous record stream
//!
//! Resources implement [`ItemResource`] plus [`PageResource`] or
//! [`StreamResource`]. [`QueryPages`] covers plain `?page=&per_page=` APIs.
//!
//! # Example
//!
//! ```no_run
//! use restful_client::HttpClient;
//! use restful_model::{ListModel, QueryPages};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Repository {
//!     full_name: String,
//!     html_url: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::with_base_uri("https://api.github.com/")?);
//! let repositories: ListModel<Repository> =
//!     ListModel::new(QueryPages::new(client, "orgs/idea2app/repos"));
//!
//! let first = repositories.next_page().await?;
//! let second = repositories.next_page().await?;
//! assert_eq!(repositories.page_index.get(), 2);
//! # Ok(())
//! # }
//! ```

mod base;
mod buffer;
mod error;
mod item;
mod list;
mod query;
mod resource;
mod stream;
mod validate;

pub use base::{BaseModel, Status, ToggleGuard};
pub use buffer::BufferListModel;
pub use error::{ModelError, ModelResult};
pub use item::ItemModel;
pub use list::{ListConfig, ListModel};
pub use query::{query_pairs, QueryPages, QueryPagesConfig};
pub use resource::{ItemResource, PageResource, Record, StreamResource};
pub use stream::StreamListModel;
pub use validate::{InvalidError, InvalidMessage, Validate, Violations};
