use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::{AdminError, ServerVersion};
use crate::core::types::SiteId;
use crate::storage::CertificateStoreError;

pub mod factory;
pub mod session;

pub use factory::SessionFactory;
pub use session::{SessionPhase, ValidationSession};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("site {0} is required for validation but does not exist")]
    SiteNotFound(SiteId),
    #[error("certificate does not name a host to bind")]
    MissingHostname,
    #[error("session is bound to {expected}, refusing to install for {found}")]
    HostMismatch { expected: String, found: String },
    #[error("session was already removed and cannot be reused")]
    SessionClosed,
    #[error("server version {found} is not supported (requires {required}.0 or later)")]
    Ineligible { found: ServerVersion, required: u32 },
    #[error("invalid validation target: {0}")]
    InvalidTarget(String),
    #[error("failed to apply changes to the server: {0}")]
    Commit(#[source] AdminError),
    #[error("server administration failed: {0}")]
    Admin(#[from] AdminError),
    #[error("certificate store failed: {0}")]
    Store(#[from] CertificateStoreError),
    #[error("admin client lock poisoned: {0}")]
    Poisoned(String),
}

/// Knobs shared by every session a factory creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Port of the temporary TLS binding.
    pub https_port: u16,
    /// Port of the plain binding a temporary site is created with.
    pub http_port: u16,
    pub ip_wildcard: String,
    /// Physical path given to temporary sites; never served from.
    pub placeholder_path: String,
    pub min_server_major_version: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            https_port: 443,
            http_port: 80,
            ip_wildcard: "*".to_string(),
            placeholder_path: "X:\\".to_string(),
            min_server_major_version: 8,
        }
    }
}
