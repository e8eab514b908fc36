//! Folder bootstrap handler
//!
//! POST /init-folders seeds the fixed set of placeholder keys that make the
//! bucket's folder layout visible in object browsers.

use futures::future::try_join_all;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::http;
use crate::store::{HttpMetadata, ObjectStore, StoreError};

/// Placeholder keys written by the bootstrap
pub(crate) const FOLDER_KEYS: [&str; 5] = [
    "evidence/.keep",
    "evidence/plat_menterprise/.keep",
    "packs/.keep",
    "packs/all-platforms/.keep",
    "packs/plat_menterprise/.keep",
];

/// Placeholder content
const PLACEHOLDER: &[u8] = b"keep";

#[derive(Serialize)]
struct FoldersCreated {
    ok: bool,
    created: Vec<&'static str>,
}

/// Handle POST /init-folders.
///
/// All placeholder writes run concurrently; one failure fails the request.
/// Re-running overwrites the placeholders, so the route is idempotent.
pub async fn init_folders(store: &dyn ObjectStore) -> Result<Response<Full<Bytes>>, StoreError> {
    let writes = FOLDER_KEYS
        .iter()
        .map(|key| store.put(key, Bytes::from_static(PLACEHOLDER), HttpMetadata::default()));
    try_join_all(writes).await?;

    Ok(http::json_response(
        StatusCode::OK,
        &FoldersCreated {
            ok: true,
            created: FOLDER_KEYS.to_vec(),
        },
    ))
}
