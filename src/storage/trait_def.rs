use crate::models::{NewVisit, Visit};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid visit: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only store of visits
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create table and indexes)
    async fn init(&self) -> Result<()>;

    /// Persist a visit and return it with its assigned id
    async fn insert(&self, visit: &NewVisit) -> StorageResult<Visit>;

    /// Every visit, newest first
    async fn list_all(&self) -> StorageResult<Vec<Visit>>;

    /// A page of visits, newest first
    async fn list(&self, limit: i64, offset: i64) -> StorageResult<Vec<Visit>>;

    /// Number of stored visits
    async fn count(&self) -> StorageResult<i64>;
}

/// Reject visits that would break the stored-record invariants.
pub(crate) fn validate(visit: &NewVisit) -> StorageResult<()> {
    if visit.ip.trim().is_empty() {
        return Err(StorageError::Invalid("ip must not be empty"));
    }
    Ok(())
}
