use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::parse_x509_certificate;

use crate::domain::normalize_hostname;

/// A certificate as seen by a validation session: the hash the web server
/// binds to, where it is stored, and the host names it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Raw thumbprint bytes passed to the binding.
    pub hash: Vec<u8>,
    /// Named certificate store, `None` for a store-less (central) layout.
    pub store_name: Option<String>,
    /// Host names in certificate order; the first one is bound.
    pub host_names: Vec<String>,
    /// PEM material persisted by the certificate store, when known.
    pub pem: Option<String>,
}

impl CertificateInfo {
    pub fn new(hash: Vec<u8>, host_names: Vec<String>) -> Self {
        Self {
            hash,
            store_name: None,
            host_names,
            pem: None,
        }
    }

    pub fn with_store_name(mut self, store_name: Option<String>) -> Self {
        self.store_name = store_name.filter(|name| !name.trim().is_empty());
        self
    }

    /// Builds a reference from the first certificate in a PEM bundle.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let blocks = pem::parse_many(pem_text).context("failed to parse PEM input")?;
        let block = blocks
            .iter()
            .find(|block| block.tag() == "CERTIFICATE")
            .ok_or_else(|| anyhow!("no CERTIFICATE block found in PEM input"))?;
        let der = block.contents();

        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;

        let mut host_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    push_unique(&mut host_names, dns);
                }
            }
        }
        if host_names.is_empty() {
            for cn in cert.subject().iter_common_name() {
                if let Ok(value) = cn.as_str() {
                    push_unique(&mut host_names, value);
                }
            }
        }
        if host_names.is_empty() {
            return Err(anyhow!("certificate does not name any host"));
        }

        let hash = Sha256::digest(der).to_vec();
        Ok(Self {
            hash,
            store_name: None,
            host_names,
            pem: Some(pem_text.to_string()),
        })
    }

    pub fn thumbprint(&self) -> String {
        hex::encode_upper(&self.hash)
    }

    pub fn primary_host(&self) -> Option<&str> {
        self.host_names.first().map(String::as_str)
    }
}

fn push_unique(host_names: &mut Vec<String>, raw: &str) {
    let Ok(host) = normalize_hostname(raw) else {
        log::debug!("[certificate] skipping unparsable host name {raw}");
        return;
    };
    if !host_names.contains(&host) {
        host_names.push(host);
    }
}
