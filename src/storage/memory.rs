use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::trace;

use super::store::{CertificateStore, CertificateStoreError};
use crate::core::certificate::CertificateInfo;

/// In-memory certificate store
#[derive(Clone, Default)]
pub struct MemoryCertificateStore {
    certificates: Arc<RwLock<HashMap<String, CertificateInfo>>>,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, certificate: &CertificateInfo) -> bool {
        self.certificates
            .read()
            .map(|map| map.contains_key(&certificate.thumbprint()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.certificates.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn save(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError> {
        let mut map = self
            .certificates
            .write()
            .map_err(|e| CertificateStoreError::Unavailable(e.to_string()))?;
        trace!("[cert-store] memory save {}", certificate.thumbprint());
        map.insert(certificate.thumbprint(), certificate.clone());
        Ok(())
    }

    fn delete(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError> {
        let mut map = self
            .certificates
            .write()
            .map_err(|e| CertificateStoreError::Unavailable(e.to_string()))?;
        trace!("[cert-store] memory delete {}", certificate.thumbprint());
        map.remove(&certificate.thumbprint());
        Ok(())
    }
}
