//! Single-record model.

use restful_persist::Observable;
use restful_types::ItemId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::base::{BaseModel, Status};
use crate::error::ModelResult;
use crate::resource::{ItemResource, Record};

/// Loads, saves and deletes single records of one resource, keeping the
/// last one in `current_one`.
pub struct ItemModel<D: Record> {
    resource: Arc<dyn ItemResource<D>>,
    pub base: BaseModel,
    pub current_one: Observable<Option<D>>,
}

impl<D: Record> Clone for ItemModel<D> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            base: self.base.clone(),
            current_one: self.current_one.clone(),
        }
    }
}

impl<D: Record> ItemModel<D> {
    pub fn new(resource: impl ItemResource<D> + 'static) -> Self {
        Self::from_arc(Arc::new(resource))
    }

    pub fn from_arc(resource: Arc<dyn ItemResource<D>>) -> Self {
        Self {
            resource,
            base: BaseModel::new(),
            current_one: Observable::new(None),
        }
    }

    pub fn resource(&self) -> &Arc<dyn ItemResource<D>> {
        &self.resource
    }

    pub fn index_key(&self) -> &str {
        self.resource.index_key()
    }

    pub async fn get_one(&self, id: &ItemId) -> ModelResult<D> {
        let _loading = self.base.toggle(Status::Downloading);

        let one = self.resource.get_one(id).await?;
        self.current_one.set(Some(one.clone()));
        Ok(one)
    }

    /// Updates record `id`, or creates one when `id` is `None`.
    pub async fn update_one<I>(&self, data: &I, id: Option<&ItemId>) -> ModelResult<D>
    where
        I: Serialize + ?Sized,
    {
        let data = serde_json::to_value(data)?;
        let _saving = self.base.toggle(Status::Uploading);

        let one = self.resource.update_one(&data, id).await?;
        self.current_one.set(Some(one.clone()));
        Ok(one)
    }

    pub async fn delete_one(&self, id: &ItemId) -> ModelResult<()> {
        let _saving = self.base.toggle(Status::Uploading);

        self.resource.delete_one(id).await?;
        debug!("Deleted {}/{}", self.resource.base_uri(), id);
        self.current_one.set(None);
        Ok(())
    }

    pub fn clear_current(&self) {
        self.current_one.set(None);
        self.base.clear();
    }

    pub fn clear(&self) {
        self.clear_current();
    }
}

impl<D: Record + fmt::Debug> fmt::Debug for ItemModel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemModel")
            .field("base", &self.base)
            .field("current_one", &self.current_one)
            .finish_non_exhaustive()
    }
}
