//! In-memory store backend
//!
//! Keeps whole objects in a `BTreeMap` so prefix listings come back in key
//! order with no extra sorting. Selected with `backend = "memory"` in the
//! `[storage]` section; also what the handler tests run against.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{etag, HttpMetadata, ObjectMeta, ObjectStore, StoreResult, StoredObject};

struct Entry {
    meta: ObjectMeta,
    http_metadata: HttpMetadata,
    body: Bytes,
}

/// Process-local object store
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        http_metadata: HttpMetadata,
    ) -> StoreResult<ObjectMeta> {
        let meta = ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            etag: etag::generate(&body),
            uploaded: Utc::now(),
        };
        let entry = Entry {
            meta: meta.clone(),
            http_metadata,
            body,
        };
        self.objects.write().await.insert(key.to_string(), entry);
        Ok(meta)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|entry| StoredObject {
            meta: entry.meta.clone(),
            http_metadata: entry.http_metadata.clone(),
            body: entry.body.clone(),
        }))
    }

    async fn list(&self, prefix: &str, limit: usize) -> StoreResult<Vec<ObjectMeta>> {
        let objects = self.objects.read().await;
        // Prefix matches form a contiguous range in key order
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit)
            .map(|(_, entry)| entry.meta.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
