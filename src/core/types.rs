use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::normalize_hostname;

/// Numeric identifier of a site on the web server.
pub type SiteId = u64;

/// TLS binding flags understood by the web server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SslFlags(u32);

impl SslFlags {
    pub const NONE: SslFlags = SslFlags(0);
    /// Server Name Indication is required to select the certificate.
    pub const SNI: SslFlags = SslFlags(1);
    /// The certificate is referenced by hash without a named local store.
    pub const CENTRAL_CERT_STORE: SslFlags = SslFlags(2);

    pub fn contains(self, other: SslFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags for a temporary validation binding: SNI always, plus the
    /// central-store marker when the certificate is not held in a named store.
    pub fn for_certificate(store_name: Option<&str>) -> Self {
        let mut flags = SslFlags::SNI;
        if store_name.is_none() {
            flags |= SslFlags::CENTRAL_CERT_STORE;
        }
        flags
    }
}

impl BitOr for SslFlags {
    type Output = SslFlags;

    fn bitor(self, rhs: SslFlags) -> SslFlags {
        SslFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SslFlags {
    fn bitor_assign(&mut self, rhs: SslFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SslFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(SslFlags::SNI) {
            names.push("sni");
        }
        if self.contains(SslFlags::CENTRAL_CERT_STORE) {
            names.push("central");
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// The hostname being validated plus the sites its renewal is configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTarget {
    /// Normalized ASCII hostname of the identifier under validation.
    pub identifier: String,
    /// Site explicitly configured to host validation bindings.
    pub validation_site_id: Option<SiteId>,
    /// Site the certificate will eventually be deployed to.
    pub target_site_id: Option<SiteId>,
}

impl ValidationTarget {
    pub fn new(identifier: &str) -> Result<Self> {
        Ok(Self {
            identifier: normalize_hostname(identifier)?,
            validation_site_id: None,
            target_site_id: None,
        })
    }

    pub fn with_validation_site(mut self, id: Option<SiteId>) -> Self {
        self.validation_site_id = id;
        self
    }

    pub fn with_target_site(mut self, id: Option<SiteId>) -> Self {
        self.target_site_id = id;
        self
    }
}

/// Which site a session should place its binding on, chosen before install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteSelection {
    /// No reusable site was configured; install creates a temporary one.
    CreateTemporary,
    Existing(SiteId),
}

impl SiteSelection {
    /// Validation site first, then the deployment site. An id of zero counts as unset.
    pub fn for_target(target: &ValidationTarget) -> Self {
        target
            .validation_site_id
            .filter(|id| *id != 0)
            .or(target.target_site_id.filter(|id| *id != 0))
            .map(SiteSelection::Existing)
            .unwrap_or(SiteSelection::CreateTemporary)
    }
}

/// The site a session has actually resolved and must clean up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteReference {
    Unresolved,
    /// A pre-existing site that only gets a binding added and later removed.
    Existing(SiteId),
    /// A site created by the session, deleted as a whole on removal.
    Created(SiteId),
}

impl SiteReference {
    pub fn site_id(&self) -> Option<SiteId> {
        match self {
            SiteReference::Unresolved => None,
            SiteReference::Existing(id) | SiteReference::Created(id) => Some(*id),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SiteReference::Created(_))
    }
}
