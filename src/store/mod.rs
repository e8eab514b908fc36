//! Object store module
//!
//! Defines the storage interface the gateway is written against, plus the
//! shared object model: keys, payloads, HTTP metadata, server-assigned etags
//! and upload timestamps. Concrete backends live in submodules; handlers only
//! ever see `Arc<dyn ObjectStore>`.

pub mod etag;
pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key cannot be represented by the backend
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    /// Underlying I/O failure
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Metadata record missing or unreadable for an existing object
    #[error("metadata error for '{key}': {message}")]
    Metadata { key: String, message: String },
}

/// HTTP metadata persisted alongside an object and replayed on reads.
///
/// This mirrors what object stores keep for served-over-HTTP objects: the
/// content description headers plus caching directives. Anything else from
/// the original request is not retained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMetadata {
    pub content_type: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    /// Raw value of the `Expires` header, emitted back verbatim
    pub cache_expiry: Option<String>,
}

impl HttpMetadata {
    /// Metadata carrying only a content type
    pub fn with_content_type(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            ..Self::default()
        }
    }
}

/// Summary record for one stored object, as reported by listings.
///
/// Field order matters here: it is the order listing responses serialize in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Raw etag (unquoted)
    pub etag: String,
    pub uploaded: DateTime<Utc>,
}

impl ObjectMeta {
    /// Etag in the quoted form used by the `ETag` response header
    pub fn http_etag(&self) -> String {
        etag::http_form(&self.etag)
    }
}

/// A complete object as returned by `get`: summary, HTTP metadata, payload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub http_metadata: HttpMetadata,
    pub body: Bytes,
}

/// Storage interface the handlers are written against.
///
/// Implementations must make each write atomic per key: concurrent writes to
/// one key resolve to one of the written values, never an interleaving, and
/// a concurrent read observes a single write's object with the record that
/// describes its payload. Listings come back in lexicographic key order.
/// Callers perform no locking of their own.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any previous object.
    ///
    /// Returns the summary record for the new object, including the
    /// server-assigned etag and upload timestamp.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        http_metadata: HttpMetadata,
    ) -> StoreResult<ObjectMeta>;

    /// Fetch the object at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// List up to `limit` objects whose keys start with `prefix`, in key order.
    async fn list(&self, prefix: &str, limit: usize) -> StoreResult<Vec<ObjectMeta>>;

    /// Remove the object at `key`. Removing an absent key is not an error.
    ///
    /// No route exposes deletion; the operation is part of the backend
    /// contract and covered by the backend tests.
    #[allow(dead_code)]
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
