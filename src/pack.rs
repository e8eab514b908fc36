//! Pack document handling
//!
//! A pack is a JSON document whose `pack_metadata.pack_id` field names it.
//! This module owns the tolerant body parsing (UTF-8 byte-order mark and
//! surrounding whitespace are accepted), the identifier extraction, and the
//! derivation of storage keys under the `packs/` prefix.

use serde_json::Value;
use thiserror::Error;

/// Key prefix all pack documents are stored under
pub const PACKS_PREFIX: &str = "packs/";

/// Content type recorded for stored pack documents
pub const PACK_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const STORED_SUFFIX: &str = ".json";
const BOM: char = '\u{feff}';

/// Rejections for submitted pack bodies. The display strings are the exact
/// client-facing messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    /// Body was not valid JSON after cleanup
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
    /// `pack_metadata.pack_id` absent, empty, or not a string
    #[error("Missing pack_metadata.pack_id")]
    MissingPackId,
}

/// A parsed pack document ready to store.
#[derive(Debug)]
pub struct PackDocument {
    pub pack_id: String,
    document: Value,
}

impl PackDocument {
    /// Parse a raw POST body into a pack document.
    ///
    /// The body is decoded as UTF-8 (lossily), stripped of one leading
    /// byte-order mark, trimmed, and parsed as JSON. The document must carry
    /// a non-empty string at `pack_metadata.pack_id`.
    pub fn parse(raw: &[u8]) -> Result<Self, PackError> {
        let text = String::from_utf8_lossy(raw);
        let cleaned = text.strip_prefix(BOM).unwrap_or(&text).trim();
        let document: Value =
            serde_json::from_str(cleaned).map_err(|e| PackError::InvalidJson(e.to_string()))?;
        let pack_id = document
            .get("pack_metadata")
            .and_then(|metadata| metadata.get("pack_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(PackError::MissingPackId)?
            .to_string();
        Ok(Self { pack_id, document })
    }

    /// Key this document is stored under: `packs/<pack_id>.json`
    pub fn storage_key(&self) -> String {
        format!("{PACKS_PREFIX}{}{STORED_SUFFIX}", self.pack_id)
    }

    /// Pretty-printed serialization that gets persisted, with the document's
    /// own member order preserved.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_default()
    }
}

/// Storage key a pack fetch resolves to.
///
/// The stored suffix is appended unless the caller already supplied it, so
/// both `p1` and `p1.json` resolve to `packs/p1.json`.
pub fn lookup_key(pack_id: &str) -> String {
    if pack_id.ends_with(STORED_SUFFIX) {
        format!("{PACKS_PREFIX}{pack_id}")
    } else {
        format!("{PACKS_PREFIX}{pack_id}{STORED_SUFFIX}")
    }
}
