//! Remote upload of the timeline to an external spreadsheet endpoint.
//!
//! # Responsibility
//! - Resolve the upload endpoint through the gatekeeper and cache it.
//! - Flatten live blocks and tombstones into upload records.
//!
//! # Invariants
//! - No request is sent without a credential or without data.
//! - The credential is never logged.
//! - Failures are reported once; nothing retries automatically.

pub mod client;
pub mod record;
pub mod transport;

pub use client::{SyncClient, SyncReport};
pub use record::{flatten_block, SyncRecord, UploadPayload};
pub use transport::{HttpTransport, SyncTransport, TransportResponse};

use crate::repo::timeline_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// No gatekeeper URL configured.
    NotConfigured,
    MissingCredential,
    /// Timeline holds neither live blocks nor tombstones.
    NothingToSend,
    CredentialRejected,
    /// Transport-level failure (connect, timeout, TLS).
    Http(String),
    /// Endpoint answered with a non-success HTTP status.
    Server { status: u16 },
    /// Endpoint answered but reported an error.
    Rejected(String),
    InvalidResponse(String),
    Repo(RepoError),
}

impl SyncError {
    /// Whether the cached endpoint should be dropped after this failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::CredentialRejected | Self::Server { status: 401 | 403 | 404 }
        )
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "sync gatekeeper url is not configured"),
            Self::MissingCredential => write!(f, "sync credential is required"),
            Self::NothingToSend => write!(f, "timeline is empty; nothing to send"),
            Self::CredentialRejected => write!(f, "sync credential was rejected"),
            Self::Http(message) => write!(f, "sync request failed: {message}"),
            Self::Server { status } => write!(f, "sync endpoint returned HTTP {status}"),
            Self::Rejected(message) => write!(f, "sync endpoint reported an error: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid sync response: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
