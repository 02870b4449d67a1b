//! Observable fields mirrored into a local key-value store.
//!
//! - [`Observable`]: a reactive cell models keep their state in
//! - [`KvStore`]: where persisted fields go ([`MemoryStore`], [`SqliteStore`])
//! - [`Persistor`]: registers fields of one model instance, restores them,
//!   keeps the store in sync with later changes, and destroys them
//!
//! # Example
//!
//! ```no_run
//! use restful_persist::{MemoryStore, Observable, PersistOptions, Persistor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> restful_persist::PersistResult<()> {
//! let name = Observable::new(String::new());
//! let token = Observable::new(String::new());
//!
//! let persistor = Persistor::new(Arc::new(MemoryStore::new()), "Session")
//!     .field("name", &name)
//!     .field_with("token", &token, PersistOptions::default().expire_in(Duration::from_secs(3600)));
//!
//! persistor.restore().await?;
//! name.set("Alice".to_string()); // saved as `Session-name`
//! # Ok(())
//! # }
//! ```

mod codec;
mod error;
mod observable;
mod persistor;
mod store;

pub use codec::{Codec, FnCodec, JsonCodec};
pub use error::{PersistError, PersistResult};
pub use observable::Observable;
pub use persistor::{PersistBox, PersistOptions, Persistor};
pub use store::{KvStore, MemoryStore, SqliteStore};

pub use tokio::sync::watch;
