//! `ETag` generation for stored objects
//!
//! Every write is assigned an etag derived from the object content. The raw
//! form (no quotes) is what listings and metadata carry; the quoted form is
//! what goes into the `ETag` response header.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate the raw etag for object content using fast hashing
///
/// # Arguments
/// * `content` - Object payload
///
/// # Returns
/// Unquoted hex string, e.g., `abc123def`
pub fn generate(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("{v:x}")
}

/// Wrap a raw etag in the quoted form used by the `ETag` header
pub fn http_form(raw: &str) -> String {
    format!("\"{raw}\"")
}
