//! Status counters and validity shared by every model.

use restful_persist::Observable;
use tracing::debug;

use crate::error::ModelResult;
use crate::validate::{InvalidError, InvalidMessage, Validate};

/// Which counter an operation toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Downloading,
    Uploading,
}

/// Observable status of a model.
///
/// `downloading` and `uploading` count in-flight operations, so two
/// overlapping loads read `2` until both finish.
#[derive(Debug, Clone, Default)]
pub struct BaseModel {
    pub downloading: Observable<usize>,
    pub uploading: Observable<usize>,
    pub validity: Observable<InvalidMessage>,
}

impl BaseModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, status: Status) -> &Observable<usize> {
        match status {
            Status::Downloading => &self.downloading,
            Status::Uploading => &self.uploading,
        }
    }

    /// Increments a counter until the returned guard is dropped.
    pub fn toggle(&self, status: Status) -> ToggleGuard {
        let counter = self.counter(status).clone();
        counter.update(|count| *count += 1);

        ToggleGuard { counter }
    }

    /// Validates `input`, recording failed constraints in `validity`.
    pub fn validate<T: Validate + ?Sized>(&self, input: &T) -> ModelResult<()> {
        match input.validate() {
            Ok(()) => {
                self.validity.set(InvalidMessage::new());
                Ok(())
            }
            Err(fields) => {
                debug!("Validation failed on {} field(s)", fields.len());
                self.validity.set(fields.clone());
                Err(InvalidError::from(fields).into())
            }
        }
    }

    pub fn clear(&self) {
        self.validity.set(InvalidMessage::new());
    }
}

/// Decrements its status counter on drop.
#[must_use = "the status is reset as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ToggleGuard {
    counter: Observable<usize>,
}

impl Drop for ToggleGuard {
    fn drop(&mut self) {
        self.counter.update(|count| *count = count.saturating_sub(1));
    }
}
