use std::sync::Arc;

use log::{debug, info, warn};

use super::{SessionOptions, ValidationError, ValidationSession};
use crate::admin::{ServerVersion, SharedAdminClient};
use crate::core::types::{SiteSelection, ValidationTarget};
use crate::storage::CertificateStore;

/// Builds validation sessions against one web server.
#[derive(Clone)]
pub struct SessionFactory {
    admin: SharedAdminClient,
    store: Arc<dyn CertificateStore>,
    options: SessionOptions,
}

impl SessionFactory {
    pub fn new(
        admin: SharedAdminClient,
        store: Arc<dyn CertificateStore>,
        options: SessionOptions,
    ) -> Self {
        Self {
            admin,
            store,
            options,
        }
    }

    /// Whether a server of `version` supports SNI bindings for validation.
    pub fn is_eligible(version: ServerVersion, min_major: u32) -> bool {
        version.major >= min_major
    }

    /// Reported version of the managed server; never touches site state.
    pub fn server_version(&self) -> Result<ServerVersion, ValidationError> {
        let admin = self
            .admin
            .lock()
            .map_err(|err| ValidationError::Poisoned(err.to_string()))?;
        Ok(admin.server_version())
    }

    pub fn can_validate(&self) -> bool {
        match self.server_version() {
            Ok(version) => Self::is_eligible(version, self.options.min_server_major_version),
            Err(err) => {
                warn!("[factory] unable to read server version: {err}");
                false
            }
        }
    }

    /// Creates a session for `target`, refusing servers that fail the version gate.
    pub fn create(&self, target: &ValidationTarget) -> Result<ValidationSession, ValidationError> {
        if target.identifier.trim().is_empty() {
            return Err(ValidationError::InvalidTarget(
                "identifier cannot be empty".to_string(),
            ));
        }
        let version = self.server_version()?;
        let required = self.options.min_server_major_version;
        if !Self::is_eligible(version, required) {
            info!(
                "[factory] server {} cannot host validation bindings for {} (requires {}.0)",
                version, target.identifier, required
            );
            return Err(ValidationError::Ineligible {
                found: version,
                required,
            });
        }

        let selection = SiteSelection::for_target(target);
        debug!(
            "[factory] session for {} will use {:?}",
            target.identifier, selection
        );
        Ok(ValidationSession::new(
            target.clone(),
            selection,
            self.options.clone(),
            Arc::clone(&self.admin),
            Arc::clone(&self.store),
        ))
    }
}
