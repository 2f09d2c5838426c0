//! Form body detection, bounded reading and parsing.
//!
//! The request body is a single-pass stream. When a request carries form
//! content the dispatcher consumes it here, before any module runs, and
//! re-assembles it from the buffered bytes if the request is forwarded.

use axum::body::{Body, Bytes};
use futures::StreamExt;
use http::{HeaderMap, header};
use thiserror::Error;
use trellis_core::FormData;

/// Form handling errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// The body exceeds `server.form_limit`
    #[error("Form body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit
        limit: usize,
    },

    /// The body does not parse as its declared content type
    #[error("Malformed form body: {0}")]
    Malformed(String),

    /// The body stream failed
    #[error("Failed to read request body: {0}")]
    Read(String),
}

/// Form encodings the dispatcher parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `application/json`
    Json,
}

impl FormKind {
    /// Detect form content from the `Content-Type` header.
    ///
    /// Parameters such as `charset` are ignored; the media type compares
    /// case-insensitively.
    #[must_use]
    pub fn detect(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let media_type = content_type.split(';').next()?.trim();
        if media_type.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(Self::UrlEncoded)
        } else if media_type.eq_ignore_ascii_case("application/json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// Parse a fully read body.
    ///
    /// An empty body is an empty form for either encoding.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Malformed`] if the bytes do not decode.
    pub fn parse(self, bytes: &[u8]) -> Result<FormData, FormError> {
        if bytes.is_empty() {
            return Ok(FormData::default());
        }
        match self {
            Self::UrlEncoded => serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes)
                .map(FormData::from_pairs)
                .map_err(|e| FormError::Malformed(e.to_string())),
            Self::Json => serde_json::from_slice(bytes)
                .map(FormData::from_json)
                .map_err(|e| FormError::Malformed(e.to_string())),
        }
    }
}

/// Read a body completely, failing once more than `limit` bytes arrive.
///
/// A `Content-Length` above the limit is rejected before reading.
///
/// # Errors
///
/// Returns [`FormError::TooLarge`] or [`FormError::Read`].
pub async fn read_limited(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, FormError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(FormError::TooLarge { limit });
    }

    let mut buffer = Vec::with_capacity(declared.unwrap_or(0));
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FormError::Read(e.to_string()))?;
        if buffer.len() + chunk.len() > limit {
            return Err(FormError::TooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}
