//! Pack route handlers
//!
//! POST /packs stores a submitted pack document, GET /packs lists what is
//! stored under the pack prefix, GET /packs/<id> fetches one document back
//! exactly as persisted.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::http;
use crate::logger;
use crate::pack::{self, PackDocument, PACKS_PREFIX, PACK_CONTENT_TYPE};
use crate::store::{HttpMetadata, ObjectMeta, ObjectStore, StoreError};

use super::decode_path_segment;

/// Listing page size
const LIST_LIMIT: usize = 100;

/// Response body for a stored pack
#[derive(Serialize)]
struct PackStored {
    ok: bool,
    key: String,
    pack_id: String,
}

/// Response body for the pack listing
#[derive(Serialize)]
struct PackListing {
    ok: bool,
    count: usize,
    objects: Vec<ObjectMeta>,
}

/// Handle POST /packs
pub async fn store_pack(
    store: &dyn ObjectStore,
    body: &[u8],
) -> Result<Response<Full<Bytes>>, StoreError> {
    let document = match PackDocument::parse(body) {
        Ok(document) => document,
        Err(err) => {
            logger::log_warning(&format!("Rejected pack submission: {err}"));
            return Ok(http::build_400_response(&err.to_string()));
        }
    };

    let key = document.storage_key();
    store
        .put(
            &key,
            Bytes::from(document.to_pretty_json()),
            HttpMetadata::with_content_type(PACK_CONTENT_TYPE),
        )
        .await?;

    Ok(http::json_response(
        StatusCode::OK,
        &PackStored {
            ok: true,
            key,
            pack_id: document.pack_id,
        },
    ))
}

/// Handle GET /packs
pub async fn list_packs(store: &dyn ObjectStore) -> Result<Response<Full<Bytes>>, StoreError> {
    let objects = store.list(PACKS_PREFIX, LIST_LIMIT).await?;
    Ok(http::json_response(
        StatusCode::OK,
        &PackListing {
            ok: true,
            count: objects.len(),
            objects,
        },
    ))
}

/// Handle GET /packs/<id>
pub async fn fetch_pack(
    store: &dyn ObjectStore,
    raw_id: &str,
) -> Result<Response<Full<Bytes>>, StoreError> {
    let Some(pack_id) = decode_path_segment(raw_id) else {
        return Ok(http::build_400_response("Invalid pack id"));
    };
    if pack_id.is_empty() {
        return Ok(http::build_400_response("Missing pack id"));
    }

    let key = pack::lookup_key(&pack_id);
    match store.get(&key).await? {
        Some(object) => Ok(http::build_object_response(&object)),
        None => Ok(http::build_404_response()),
    }
}
