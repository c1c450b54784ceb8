//! In-memory object model of a web server's sites and bindings.
//!
//! Admin clients stage their mutations on a [`ServerModel`] and decide for
//! themselves how a commit reaches the live server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AdminError;
use crate::core::types::{SiteId, SslFlags};
use crate::domain::hosts_match;

pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_HTTPS: &str = "https";

/// Version reported by the web server, e.g. `10.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(10, 0)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ServerVersion {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid server version: {raw}");
        // Build and revision parts ("10.0.17763") are ignored.
        let mut parts = raw.trim().split('.');
        let major = parts
            .next()
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(part) => part.parse::<u32>().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for ServerVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerVersion> for String {
    fn from(value: ServerVersion) -> Self {
        value.to_string()
    }
}

/// A single protocol/address/host binding on a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub protocol: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub host: String,
    #[serde(default, with = "hex_hash", skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(default)]
    pub ssl_flags: SslFlags,
}

impl Binding {
    /// Parses `ip:port:host` binding information.
    pub fn parse(protocol: &str, information: &str) -> Result<Self, AdminError> {
        let invalid = || AdminError::InvalidBinding(information.to_string());
        let (rest, host) = information.rsplit_once(':').ok_or_else(invalid)?;
        let (ip, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if ip.is_empty() || port == 0 {
            return Err(invalid());
        }
        Ok(Self {
            protocol: protocol.to_ascii_lowercase(),
            ip: ip.to_string(),
            port,
            host: host.to_string(),
            certificate_hash: None,
            store_name: None,
            ssl_flags: SslFlags::NONE,
        })
    }

    pub fn binding_information(&self) -> String {
        format!("{}:{}:{}", self.ip, self.port, self.host)
    }

    pub fn is_https(&self) -> bool {
        self.protocol.eq_ignore_ascii_case(PROTOCOL_HTTPS)
    }

    /// True for the https binding serving `host` on `port`.
    pub fn serves(&self, host: &str, port: u16) -> bool {
        self.is_https() && self.port == port && hosts_match(&self.host, host)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.binding_information())
    }
}

/// Desired state of a TLS binding, applied with add-or-update semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub host: String,
    pub port: u16,
    pub ip: String,
    pub certificate_hash: Vec<u8>,
    pub store_name: Option<String>,
    pub ssl_flags: SslFlags,
}

impl BindingSpec {
    fn apply_to(&self, binding: &mut Binding) {
        binding.ip = self.ip.clone();
        binding.certificate_hash = Some(self.certificate_hash.clone());
        binding.store_name = self.store_name.clone();
        binding.ssl_flags = self.ssl_flags;
    }

    fn to_binding(&self) -> Binding {
        Binding {
            protocol: PROTOCOL_HTTPS.to_string(),
            ip: self.ip.clone(),
            port: self.port,
            host: self.host.clone(),
            certificate_hash: Some(self.certificate_hash.clone()),
            store_name: self.store_name.clone(),
            ssl_flags: self.ssl_flags,
        }
    }

    /// Spec that puts `binding` back exactly as it was.
    pub fn restoring(binding: &Binding) -> Option<Self> {
        Some(Self {
            host: binding.host.clone(),
            port: binding.port,
            ip: binding.ip.clone(),
            certificate_hash: binding.certificate_hash.clone()?,
            store_name: binding.store_name.clone(),
            ssl_flags: binding.ssl_flags,
        })
    }
}

/// Outcome of an add-or-update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    Added,
    /// An existing binding for the same host and port was rewritten.
    Updated { previous: Binding },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    #[serde(default)]
    pub physical_path: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl Site {
    pub fn find_binding(&self, host: &str, port: u16) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.serves(host, port))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerModel {
    #[serde(default)]
    pub version: ServerVersion,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl ServerModel {
    pub fn new(version: ServerVersion) -> Self {
        Self {
            version,
            sites: Vec::new(),
        }
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.iter().find(|site| site.id == id)
    }

    fn site_mut(&mut self, id: SiteId) -> Result<&mut Site, AdminError> {
        self.sites
            .iter_mut()
            .find(|site| site.id == id)
            .ok_or(AdminError::SiteNotFound(id))
    }

    fn next_site_id(&self) -> Result<SiteId, AdminError> {
        let highest = self.sites.iter().map(|site| site.id).max().unwrap_or(0);
        highest.checked_add(1).ok_or_else(|| {
            AdminError::InvalidSite(format!("no site id left after {highest}"))
        })
    }

    pub fn create_site(
        &mut self,
        name: &str,
        protocol: &str,
        binding_information: &str,
        physical_path: &str,
    ) -> Result<Site, AdminError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdminError::InvalidSite("site name cannot be empty".into()));
        }
        if physical_path.trim().is_empty() {
            return Err(AdminError::InvalidSite(format!(
                "site '{name}' needs a physical path"
            )));
        }
        if self
            .sites
            .iter()
            .any(|site| site.name.eq_ignore_ascii_case(name))
        {
            return Err(AdminError::InvalidSite(format!(
                "a site named '{name}' already exists"
            )));
        }
        let binding = Binding::parse(protocol, binding_information)?;
        let site = Site {
            id: self.next_site_id()?,
            name: name.to_string(),
            physical_path: physical_path.to_string(),
            bindings: vec![binding],
        };
        self.sites.push(site.clone());
        Ok(site)
    }

    pub fn delete_site(&mut self, id: SiteId) -> bool {
        let before = self.sites.len();
        self.sites.retain(|site| site.id != id);
        self.sites.len() != before
    }

    pub fn add_or_update_binding(
        &mut self,
        site_id: SiteId,
        spec: &BindingSpec,
    ) -> Result<BindingChange, AdminError> {
        if spec.port == 0 || spec.host.trim().is_empty() {
            return Err(AdminError::InvalidBinding(format!(
                "{}:{}:{}",
                spec.ip, spec.port, spec.host
            )));
        }
        let site = self.site_mut(site_id)?;
        if let Some(existing) = site
            .bindings
            .iter_mut()
            .find(|b| b.serves(&spec.host, spec.port))
        {
            let previous = existing.clone();
            spec.apply_to(existing);
            return Ok(BindingChange::Updated { previous });
        }
        site.bindings.push(spec.to_binding());
        Ok(BindingChange::Added)
    }

    pub fn remove_binding(
        &mut self,
        site_id: SiteId,
        binding: &Binding,
    ) -> Result<bool, AdminError> {
        let site = self.site_mut(site_id)?;
        match site.bindings.iter().position(|b| b == binding) {
            Some(index) => {
                site.bindings.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode_upper(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| hex::decode(s.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
