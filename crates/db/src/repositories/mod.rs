use festa_core::ports::StoreError;
use thiserror::Error;

pub mod booking;
pub mod memory;
pub mod notification;

pub use booking::SqlBookingStore;
pub use memory::{InMemoryBookingStore, InMemoryNotifier};
pub use notification::SqlNotifier;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Backend(error.to_string())
    }
}
