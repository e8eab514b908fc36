//! Object route handlers
//!
//! PUT /r2/<key> writes a raw payload into the store along with the HTTP
//! metadata carried by the request headers; GET /r2/<key> reads it back and
//! replays that metadata. Keys arrive percent-decoded and non-empty; the
//! router settles both before dispatching on the method.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Response};

use crate::http;
use crate::store::{HttpMetadata, ObjectStore, StoreError};

/// Handle PUT /r2/<key>
pub async fn save_object(
    store: &dyn ObjectStore,
    key: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response<Full<Bytes>>, StoreError> {
    if body.is_empty() {
        return Ok(http::build_400_response("Missing body"));
    }

    store.put(key, body, http_metadata_from(headers)).await?;
    Ok(http::build_text_response(format!("Saved {key}")))
}

/// Handle GET /r2/<key>
pub async fn fetch_object(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Response<Full<Bytes>>, StoreError> {
    match store.get(key).await? {
        Some(object) => Ok(http::build_object_response(&object)),
        None => Ok(http::build_404_response()),
    }
}

/// Pick out the header fields the store persists as object metadata.
fn http_metadata_from(headers: &HeaderMap) -> HttpMetadata {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    HttpMetadata {
        content_type: value("content-type"),
        content_language: value("content-language"),
        content_disposition: value("content-disposition"),
        content_encoding: value("content-encoding"),
        cache_control: value("cache-control"),
        cache_expiry: value("expires"),
    }
}
