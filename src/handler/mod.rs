//! Request handler module
//!
//! Route dispatch plus the per-route handlers for pack documents, raw
//! objects, and the folder bootstrap.

mod folders;
mod objects;
mod packs;
pub mod router;

pub use router::handle_request;

/// Percent-decode one path remainder. `None` means the decoded bytes were
/// not valid UTF-8.
pub(crate) fn decode_path_segment(raw: &str) -> Option<String> {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
