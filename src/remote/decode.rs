//! Decoding of completed job payloads.
//!
//! [`decode`] never fails: a body that cannot be interpreted comes back as
//! [`DecodedPayload::Undecoded`] so the caller can fall back to placeholder
//! output instead of aborting the run.
//!
//! The service does not document which channel holds which variable in
//! binary results. That ordering is an assumption of the downstream stage
//! (see [`crate::forecast::ChannelLayout`]); nothing here inspects tensor
//! contents.

use serde_json::Value;

use super::types::RawResult;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Payload handed to the export stage.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// Structured text parsed into a JSON value.
    Record(Value),
    /// Raw numeric blob (headerless f32 or `.npy`); deserialization is left
    /// to the consumer.
    Blob { bytes: Vec<u8>, content_type: String },
    /// Archive, unknown type or malformed structured text.
    Undecoded { bytes: Vec<u8>, content_type: String },
}

impl DecodedPayload {
    pub fn content_type(&self) -> &str {
        match self {
            DecodedPayload::Record(_) => "application/json",
            DecodedPayload::Blob { content_type, .. }
            | DecodedPayload::Undecoded { content_type, .. } => content_type,
        }
    }

    pub fn is_undecoded(&self) -> bool {
        matches!(self, DecodedPayload::Undecoded { .. })
    }
}

/// How a payload is treated, based on declared type and leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Structured,
    Tensor,
    Archive,
    Unknown,
}

/// Strips parameters (`; charset=...`) and lower-cases the media type.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn looks_like_json(bytes: &[u8]) -> bool {
    matches!(
        bytes.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'{') | Some(b'[')
    )
}

/// Classifies a payload. The declared type wins except where the body
/// itself says otherwise (ZIP signature, untyped JSON).
pub fn classify(content_type: &str, bytes: &[u8]) -> PayloadKind {
    let media = media_type(content_type);
    match media.as_str() {
        "application/json" | "text/json" => PayloadKind::Structured,
        m if m.ends_with("+json") => PayloadKind::Structured,
        "application/zip" | "application/x-zip-compressed" | "application/gzip"
        | "application/x-tar" => PayloadKind::Archive,
        "application/octet-stream"
        | "application/x-npy"
        | "application/x-numpy"
        | "application/x-tensor" => {
            if bytes.starts_with(ZIP_SIGNATURE) {
                PayloadKind::Archive
            } else {
                PayloadKind::Tensor
            }
        }
        "" | "text/plain" if looks_like_json(bytes) => PayloadKind::Structured,
        _ if bytes.starts_with(ZIP_SIGNATURE) => PayloadKind::Archive,
        _ => PayloadKind::Unknown,
    }
}

/// Decodes a completed result.
pub fn decode(result: RawResult) -> DecodedPayload {
    let RawResult {
        bytes,
        content_type,
    } = result;

    match classify(&content_type, &bytes) {
        PayloadKind::Structured => match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => DecodedPayload::Record(value),
            Err(e) => {
                log::warn!("structured payload failed to parse ({e}); keeping raw bytes");
                DecodedPayload::Undecoded {
                    bytes,
                    content_type,
                }
            }
        },
        PayloadKind::Tensor => DecodedPayload::Blob {
            bytes,
            content_type,
        },
        PayloadKind::Archive | PayloadKind::Unknown => {
            log::debug!(
                "payload of type {content_type:?} ({} bytes) left undecoded",
                bytes.len()
            );
            DecodedPayload::Undecoded {
                bytes,
                content_type,
            }
        }
    }
}
