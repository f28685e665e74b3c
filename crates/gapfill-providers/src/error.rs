//! Provider error types.

use thiserror::Error;

use gapfill_core::DatasetError;

/// Errors that can occur when fetching a dataset.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No dataset exists at the location.
    #[error("dataset not found: {0}")]
    NotFound(String),

    /// The server answered with an error status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No source handles this kind of location.
    #[error("unsupported dataset location: {0}")]
    UnsupportedLocation(String),
}

impl ProviderError {
    /// Wrap as a dataset fetch failure for `origin`.
    pub fn into_fetch_error(self, origin: &str) -> DatasetError {
        DatasetError::Fetch {
            origin: origin.to_string(),
            reason: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_keeps_origin_and_reason() {
        let err = ProviderError::HttpStatus {
            status: 503,
            message: "maintenance".into(),
        }
        .into_fetch_error("https://example.com/set01.json");
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/set01.json"));
        assert!(msg.contains("HTTP 503"));
        assert!(!err.is_malformed());
    }
}
