//! Filesystem store backend
//!
//! Objects are laid out as two parallel trees under the configured root:
//! `blobs/<key>` holds payloads, `meta/<key>.json` holds the serialized
//! object record (summary plus HTTP metadata). Keys are resolved through the
//! record tree, and `put` renames the payload into place before the record,
//! so a visible key always has its payload. All writes go through uniquely
//! named temp files in the destination directory, keeping each rename
//! atomic. Access to any one key is serialized by a per-key lock, so
//! concurrent writes are last-write-wins and a reader always gets the record
//! and payload of a single write.
//!
//! One layout restriction: a key cannot name both an object and a folder of
//! other objects (`x` and `x/y`), since the payload for `x` occupies the
//! directory slot `x/y` would need.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task;
use walkdir::WalkDir;

use super::{etag, HttpMetadata, ObjectMeta, ObjectStore, StoreError, StoreResult, StoredObject};

const BLOBS_DIR: &str = "blobs";
const META_DIR: &str = "meta";
const META_SUFFIX: &str = ".json";

/// On-disk record kept for each object
#[derive(Serialize, Deserialize)]
struct MetaRecord {
    meta: ObjectMeta,
    http_metadata: HttpMetadata,
}

/// Store backed by a local directory tree
pub struct FsStore {
    blob_root: PathBuf,
    meta_root: PathBuf,
    tmp_serial: AtomicU64,
    key_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the layout if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let blob_root = root.join(BLOBS_DIR);
        let meta_root = root.join(META_DIR);
        std::fs::create_dir_all(&blob_root)?;
        std::fs::create_dir_all(&meta_root)?;
        Ok(Self {
            blob_root,
            meta_root,
            tmp_serial: AtomicU64::new(0),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Payload location for a validated key
    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.blob_root.clone();
        path.extend(key.split('/'));
        path
    }

    /// Record location for a validated key
    fn meta_path(&self, key: &str) -> PathBuf {
        let mut path = self.meta_root.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{META_SUFFIX}"));
            }
        }
        path
    }

    /// Write `contents` to `path` through a temp file in the same directory.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> StoreResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
        fs::create_dir_all(parent).await?;
        let serial = self.tmp_serial.fetch_add(1, Ordering::Relaxed);
        let tmp = parent.join(format!(".tmp-{}-{serial}", std::process::id()));
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Lock serializing payload and record access for one validated key.
    /// Locks are created on first use and live as long as the store.
    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.key_locks.lock().unwrap();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        http_metadata: HttpMetadata,
    ) -> StoreResult<ObjectMeta> {
        validate_key(key)?;
        let meta = ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            etag: etag::generate(&body),
            uploaded: Utc::now(),
        };
        let record = MetaRecord {
            meta: meta.clone(),
            http_metadata,
        };
        let serialized = serde_json::to_vec(&record).map_err(|e| StoreError::Metadata {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.write_atomic(&self.blob_path(key), &body).await?;
        // Record rename is the commit point; readers resolve keys through it
        self.write_atomic(&self.meta_path(key), &serialized).await?;
        Ok(meta)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        validate_key(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        let record_bytes = match fs::read(self.meta_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: MetaRecord =
            serde_json::from_slice(&record_bytes).map_err(|e| StoreError::Metadata {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        let body = match fs::read(self.blob_path(key)).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Metadata {
                    key: key.to_string(),
                    message: "record exists but payload is missing".to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredObject {
            meta: record.meta,
            http_metadata: record.http_metadata,
            body,
        }))
    }

    async fn list(&self, prefix: &str, limit: usize) -> StoreResult<Vec<ObjectMeta>> {
        let meta_root = self.meta_root.clone();
        let prefix = prefix.to_string();
        task::spawn_blocking(move || list_records(&meta_root, &prefix, limit))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        // Record goes first so the key stops resolving before the payload does
        for path in [self.meta_path(key), self.blob_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Reject keys the directory layout cannot represent safely.
///
/// A valid key is non-empty, free of NUL bytes, and made of `/` separated
/// segments where no segment is empty, `.`, or `..`. That also rules out
/// leading and trailing slashes, so resolved paths always stay inside the
/// store root.
fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.contains('\0')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Recover an object key from a record path relative to the record root.
///
/// Returns `None` for anything that is not a well-formed record: non-UTF-8
/// names, unexpected path components, or files without the record suffix
/// (leftover temp files, mainly).
fn key_from_rel_path(rel: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?),
            _ => return None,
        }
    }
    let joined = segments.join("/");
    joined.strip_suffix(META_SUFFIX).map(str::to_string)
}

/// Blocking walk of the record tree for `list`.
fn list_records(meta_root: &Path, prefix: &str, limit: usize) -> StoreResult<Vec<ObjectMeta>> {
    let mut keyed: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(meta_root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(meta_root) else {
            continue;
        };
        let Some(key) = key_from_rel_path(rel) else {
            continue;
        };
        if key.starts_with(prefix) {
            keyed.push((key, entry.into_path()));
        }
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.truncate(limit);

    let mut records = Vec::with_capacity(keyed.len());
    for (key, path) in keyed {
        let bytes = std::fs::read(&path)?;
        let record: MetaRecord =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Metadata {
                key,
                message: e.to_string(),
            })?;
        records.push(record.meta);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip_with_metadata() {
        let (_dir, store) = open_store();
        let metadata = HttpMetadata {
            content_type: Some("application/json; charset=utf-8".to_string()),
            cache_control: Some("no-store".to_string()),
            ..HttpMetadata::default()
        };
        let meta = store
            .put("packs/p.json", Bytes::from_static(b"{}"), metadata.clone())
            .await
            .unwrap();
        assert_eq!(meta.size, 2);

        let object = store.get("packs/p.json").await.unwrap().unwrap();
        assert_eq!(object.body.as_ref(), b"{}");
        assert_eq!(object.meta.etag, meta.etag);
        assert_eq!(object.http_metadata, metadata);
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let (_dir, store) = open_store();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_object() {
        let (_dir, store) = open_store();
        let first = store
            .put("k", Bytes::from_static(b"one"), HttpMetadata::default())
            .await
            .unwrap();
        let second = store
            .put("k", Bytes::from_static(b"second"), HttpMetadata::default())
            .await
            .unwrap();
        assert_ne!(first.etag, second.etag);

        let object = store.get("k").await.unwrap().unwrap();
        assert_eq!(object.body.as_ref(), b"second");

        let listed = store.list("", 100).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 6);
    }

    #[tokio::test]
    async fn test_concurrent_writes_never_serve_torn_objects() {
        let (_dir, store) = open_store();
        let store = Arc::new(store);
        let key = "race/object";
        store
            .put(key, Bytes::from_static(b"aa"), HttpMetadata::default())
            .await
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for round in 0..200_u32 {
                    let body = if round % 2 == 0 {
                        Bytes::from_static(b"abcdefgh")
                    } else {
                        Bytes::from_static(b"aa")
                    };
                    store.put(key, body, HttpMetadata::default()).await.unwrap();
                }
            })
        };
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let object = store.get(key).await.unwrap().unwrap();
                    // The record must describe the body actually served
                    assert_eq!(object.meta.size, object.body.len() as u64);
                    assert_eq!(object.meta.etag, etag::generate(&object.body));
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();

        let settled = store.get(key).await.unwrap().unwrap();
        assert_eq!(settled.body.as_ref(), b"aa");
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let (_dir, store) = open_store();
        for key in ["", "/abs", "trailing/", "a//b", "..", "../x", "a/../b", "a/./b", "nul\0key"] {
            let err = store
                .put(key, Bytes::from_static(b"x"), HttpMetadata::default())
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "key {key:?}");
        }
        // Dotfile segments are ordinary names, not traversal
        store
            .put("evidence/.keep", Bytes::from_static(b"keep"), HttpMetadata::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_orders_and_limits() {
        let (_dir, store) = open_store();
        for key in [
            "packs/b.json",
            "packs/all-platforms/.keep",
            "packs/a.json",
            "evidence/.keep",
        ] {
            store
                .put(key, Bytes::from_static(b"x"), HttpMetadata::default())
                .await
                .unwrap();
        }

        let listed = store.list("packs/", 100).await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["packs/a.json", "packs/all-platforms/.keep", "packs/b.json"]);

        let limited = store.list("packs/", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_record_suffix_does_not_collide_with_key_names() {
        let (_dir, store) = open_store();
        store
            .put("a", Bytes::from_static(b"plain"), HttpMetadata::default())
            .await
            .unwrap();
        store
            .put("a.json", Bytes::from_static(b"suffixed"), HttpMetadata::default())
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().body.as_ref(), b"plain");
        assert_eq!(
            store.get("a.json").await.unwrap().unwrap().body.as_ref(),
            b"suffixed"
        );
        assert_eq!(store.list("a", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = open_store();
        store
            .put("gone", Bytes::from_static(b"x"), HttpMetadata::default())
            .await
            .unwrap();
        store.delete("gone").await.unwrap();
        assert!(store.get("gone").await.unwrap().is_none());
        store.delete("gone").await.unwrap();
    }

    #[test]
    fn test_key_from_rel_path() {
        assert_eq!(
            key_from_rel_path(Path::new("packs/p.json.json")).as_deref(),
            Some("packs/p.json")
        );
        assert_eq!(
            key_from_rel_path(Path::new("evidence/.keep.json")).as_deref(),
            Some("evidence/.keep")
        );
        // Leftover temp files carry no record suffix
        assert_eq!(key_from_rel_path(Path::new("packs/.tmp-1-0")), None);
    }
}
