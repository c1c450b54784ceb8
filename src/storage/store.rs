use thiserror::Error;

use crate::core::certificate::CertificateInfo;

/// Errors produced by certificate store backends.
#[derive(Debug, Error)]
pub enum CertificateStoreError {
    #[error("certificate store unavailable: {0}")]
    Unavailable(String),
    #[error("certificate store error: {0}")]
    Store(String),
}

/// Store-of-record for certificates exposed during validation.
///
/// Both operations are keyed by thumbprint and idempotent: saving twice keeps
/// one entry, deleting an absent certificate succeeds.
pub trait CertificateStore: Send + Sync {
    fn save(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError>;
    fn delete(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError>;
}
