//! Backend adapters for restful-models.
//!
//! The Strapi and Supabase collections are page resources, so they plug
//! into any list model. [`StrapiSession`] signs a user in and shares its
//! authorized client with the Strapi resources.
//!
//! ```no_run
//! use restful_adapters::{supabase_client, SupabaseResource};
//! use restful_model::ListModel;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(supabase_client("https://xyz.supabase.co", "anon-key")?);
//! let countries: ListModel<serde_json::Value> =
//!     ListModel::new(SupabaseResource::new(client, "countries"));
//!
//! countries.next_page().await?;
//! # Ok(())
//! # }
//! ```

pub mod qs;
mod session;
mod strapi;
mod supabase;

pub use session::{
    Media, OAuthProvider, SessionConfig, StrapiSession, StrapiUsers, UploadFile,
};
pub use strapi::{
    date_range, normalize, SortOrder, StrapiConfig, StrapiResource, KEYWORDS,
};
pub use supabase::{condition, supabase_client, SupabaseResource};
