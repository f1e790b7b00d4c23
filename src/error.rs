//! Typed errors for the I/O-facing subsystems.
//!
//! - `StoreError`: document store backends
//! - `GatewayError`: diagram encode/decode on top of a store
//! - `SaveError`: canvas saves refused or failed
//! - `IdentityError`: sign-in and account calls
//! - `SubmitError`: signup and login submissions
//! - `ChatError`: the AI chat endpoint
//!
//! Validation failures are not errors here; forms report them as per-field
//! messages (see [`crate::forms`]).

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors from a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document store is unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied for {path}")]
    PermissionDenied { path: String },

    #[error("Document store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request to document store failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document at {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Errors from the diagram persistence gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize diagram: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Stored diagram is malformed: {0}")]
    Decode(String),
}

/// Why a canvas save did not happen.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Authentication or database not ready. Cannot save.")]
    NotReady,

    #[error("Error saving diagram: {0}")]
    Gateway(#[from] GatewayError),
}

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Identity provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request to identity provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Identity provider response is missing {0}")]
    MissingField(&'static str),
}

/// Why a form submission did not go through.
#[derive(Debug, Error)]
pub enum SubmitError<F: std::hash::Hash + Eq + std::fmt::Debug> {
    /// Validation failed; the account service was not called.
    #[error("{}", crate::forms::GENERAL_ERROR)]
    Invalid(crate::forms::FieldErrors<F>),

    #[error(transparent)]
    Service(#[from] IdentityError),
}

/// Errors from the AI chat endpoint.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Server returned {0}")]
    Status(u16),

    #[error("Request to chat endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_into_gateway_error() {
        let err: GatewayError = StoreError::Unavailable("offline".into()).into();
        match &err {
            GatewayError::Store(StoreError::Unavailable(msg)) => assert_eq!(msg, "offline"),
            _ => panic!("Expected GatewayError::Store(Unavailable)"),
        }
        assert_eq!(err.to_string(), "Document store is unavailable: offline");
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = StoreError::Io {
            path: Utf8PathBuf::from("/data/main_flow.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/data/main_flow.json"));
    }

    #[test]
    fn test_save_error_messages() {
        assert_eq!(
            SaveError::NotReady.to_string(),
            "Authentication or database not ready. Cannot save."
        );
        let err = SaveError::from(GatewayError::from(StoreError::PermissionDenied {
            path: "artifacts/a/public/data/block_diagrams/main_flow".into(),
        }));
        assert_eq!(
            err.to_string(),
            "Error saving diagram: Permission denied for artifacts/a/public/data/block_diagrams/main_flow"
        );
    }

    #[test]
    fn test_chat_status_message() {
        assert_eq!(ChatError::Status(502).to_string(), "Server returned 502");
    }
}
