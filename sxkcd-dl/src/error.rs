//! Error types for sxkcd-dl
//!
//! Retryability is a property of the error: only network-level failures and
//! server-side HTTP statuses are worth another attempt. Anything wrong with
//! the body itself will be wrong again on the next request.

use serde_json::error::Category;
use std::fmt;
use thiserror::Error;

/// Which upstream API a request went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Xkcd,
    Explain,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Xkcd => f.write_str("xkcd"),
            SourceKind::Explain => f.write_str("explainxkcd"),
        }
    }
}

/// Fetch pipeline error
#[derive(Debug, Error)]
pub enum FetchError {
    /// Caller passed an unusable argument (negative id, bad URL, zero limit)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Timeout or connection-level failure
    #[error("Request to {url} failed: {message}")]
    Transient { url: String, message: String },

    /// Upstream answered with a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Body contains badly-formed JSON at byte {offset} (line {line}, column {column})")]
    MalformedJson {
        offset: usize,
        line: usize,
        column: usize,
    },

    #[error("Body ends in the middle of a JSON value")]
    TruncatedBody,

    #[error("Body is empty")]
    EmptyBody,

    #[error("Body must not be larger than {limit} bytes")]
    BodyTooLarge { limit: u64 },

    /// Well-formed JSON that does not fit the expected shape
    #[error("Body does not match expected shape: {0}")]
    Decode(String),

    /// Day/month/year triple did not form a calendar date
    #[error("Failed to parse date {value:?}")]
    DateParse { value: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// Failure attributed to one source and comic number
    #[error("{kind} #{id}: {inner}")]
    Endpoint {
        kind: SourceKind,
        id: u32,
        #[source]
        inner: Box<FetchError>,
    },
}

impl FetchError {
    /// Attach the source and comic number to an error
    pub fn at(self, kind: SourceKind, id: u32) -> Self {
        FetchError::Endpoint {
            kind,
            id,
            inner: Box::new(self),
        }
    }

    /// Innermost error, skipping source attribution
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::Endpoint { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            FetchError::Transient { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), FetchError::Cancelled)
    }
}

impl From<FetchError> for sxkcd_common::Error {
    fn from(err: FetchError) -> Self {
        match err.root() {
            FetchError::InvalidArgument(msg) => sxkcd_common::Error::InvalidInput(msg.clone()),
            FetchError::Status { status: 404, url } => sxkcd_common::Error::NotFound(url.clone()),
            _ => sxkcd_common::Error::Internal(err.to_string()),
        }
    }
}

/// Classify a serde_json failure against the body it was decoding
pub(crate) fn classify_decode_error(err: serde_json::Error, body: &[u8]) -> FetchError {
    match err.classify() {
        Category::Eof => {
            if body.iter().all(u8::is_ascii_whitespace) {
                FetchError::EmptyBody
            } else {
                FetchError::TruncatedBody
            }
        }
        Category::Syntax => FetchError::MalformedJson {
            offset: byte_offset(body, err.line(), err.column()),
            line: err.line(),
            column: err.column(),
        },
        Category::Data | Category::Io => FetchError::Decode(err.to_string()),
    }
}

/// Zero-based byte offset of a 1-based (line, column) position
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start = if line <= 1 {
        0
    } else {
        body.iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(line - 2)
            .map(|(i, _)| i + 1)
            .unwrap_or(body.len())
    };
    (line_start + column.saturating_sub(1)).min(body.len())
}
