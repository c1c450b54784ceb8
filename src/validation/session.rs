//! Install/remove of a temporary TLS binding for one validation attempt.
//!
//! A session records what it changed on the server (a site it created or a
//! site it reused, a binding it added or one it overwrote) and uses exactly
//! that record to undo the change on removal.

use std::sync::{Arc, MutexGuard};

use log::{debug, error, info, warn};
use uuid::Uuid;

use super::{SessionOptions, ValidationError};
use crate::admin::model::PROTOCOL_HTTP;
use crate::admin::{AdminClient, Binding, BindingChange, BindingSpec, SharedAdminClient};
use crate::core::certificate::CertificateInfo;
use crate::core::types::{SiteId, SiteReference, SiteSelection, SslFlags, ValidationTarget};
use crate::domain::hosts_match;
use crate::storage::CertificateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    /// A binding was applied to the admin model (possibly not yet committed).
    Installed,
    Removed,
}

#[derive(Debug)]
struct SessionState {
    site: SiteReference,
    host: Option<String>,
    /// Binding for the same host and port that existed before the first install.
    displaced: Option<Binding>,
    phase: SessionPhase,
}

pub struct ValidationSession {
    id: Uuid,
    target: ValidationTarget,
    selection: SiteSelection,
    options: SessionOptions,
    admin: SharedAdminClient,
    store: Arc<dyn CertificateStore>,
    state: SessionState,
}

impl ValidationSession {
    pub(crate) fn new(
        target: ValidationTarget,
        selection: SiteSelection,
        options: SessionOptions,
        admin: SharedAdminClient,
        store: Arc<dyn CertificateStore>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            selection,
            options,
            admin,
            store,
            state: SessionState {
                site: SiteReference::Unresolved,
                host: None,
                displaced: None,
                phase: SessionPhase::Pending,
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &ValidationTarget {
        &self.target
    }

    pub fn selection(&self) -> SiteSelection {
        self.selection
    }

    pub fn site(&self) -> SiteReference {
        self.state.site
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn displaced_binding(&self) -> Option<&Binding> {
        self.state.displaced.as_ref()
    }

    /// Makes `certificate` reachable over TLS on its first host name.
    ///
    /// Calling it again with the same certificate rewrites the same binding.
    /// When the commit fails the session keeps what it attempted, so
    /// [`ValidationSession::remove`] can still clean up.
    pub fn install(&mut self, certificate: &CertificateInfo) -> Result<(), ValidationError> {
        if self.state.phase == SessionPhase::Removed {
            return Err(ValidationError::SessionClosed);
        }
        let host = certificate
            .primary_host()
            .ok_or(ValidationError::MissingHostname)?
            .to_string();
        if let Some(expected) = &self.state.host {
            if !hosts_match(expected, &host) {
                return Err(ValidationError::HostMismatch {
                    expected: expected.clone(),
                    found: host,
                });
            }
        }
        self.state.host = Some(host.clone());

        let admin = Arc::clone(&self.admin);
        let mut admin = lock_admin(&admin)?;

        let site_id = self.resolve_site(&mut *admin, &host)?;

        let ssl_flags = SslFlags::for_certificate(certificate.store_name.as_deref());
        let spec = BindingSpec {
            host: host.clone(),
            port: self.options.https_port,
            ip: self.options.ip_wildcard.clone(),
            certificate_hash: certificate.hash.clone(),
            store_name: certificate.store_name.clone(),
            ssl_flags,
        };
        match admin.add_or_update_binding(site_id, &spec)? {
            BindingChange::Added => {
                info!(
                    "[session {}] added https binding {}:{} ({}) on site {}",
                    self.id, host, spec.port, ssl_flags, site_id
                );
            }
            BindingChange::Updated { previous } => {
                info!(
                    "[session {}] updated certificate of {} on site {}",
                    self.id, previous, site_id
                );
                let first_install = self.state.phase == SessionPhase::Pending;
                if first_install && !self.state.site.is_created() {
                    self.state.displaced = Some(previous);
                }
            }
        }
        self.state.phase = SessionPhase::Installed;

        self.store.save(certificate)?;
        admin.commit().map_err(|err| {
            error!(
                "[session {}] commit after install for {} failed: {}",
                self.id, host, err
            );
            ValidationError::Commit(err)
        })?;
        info!(
            "[session {}] {} is live for {} ({})",
            self.id,
            certificate.thumbprint(),
            host,
            self.target.identifier
        );
        Ok(())
    }

    /// Reverses whatever [`ValidationSession::install`] did.
    ///
    /// Without a resolved site this is a no-op. A created site is deleted as a
    /// whole; on a reused site only this session's binding is touched.
    pub fn remove(&mut self, certificate: &CertificateInfo) -> Result<(), ValidationError> {
        if self.state.site == SiteReference::Unresolved {
            debug!(
                "[session {}] no site resolved for {}; nothing to remove",
                self.id, self.target.identifier
            );
            return Ok(());
        }
        let host = match (&self.state.host, certificate.primary_host()) {
            (Some(recorded), Some(given)) if !hosts_match(recorded, given) => {
                warn!(
                    "[session {}] remove called with a certificate for {}; cleaning up {} instead",
                    self.id, given, recorded
                );
                recorded.clone()
            }
            (Some(recorded), _) => recorded.clone(),
            (None, Some(given)) => given.to_string(),
            (None, None) => return Err(ValidationError::MissingHostname),
        };

        let admin = Arc::clone(&self.admin);
        let mut admin = lock_admin(&admin)?;

        self.store.delete(certificate)?;

        match self.state.site {
            SiteReference::Created(id) => {
                if admin.delete_site(id)? {
                    info!("[session {}] deleted temporary site {}", self.id, id);
                } else {
                    warn!(
                        "[session {}] temporary site {} no longer exists; nothing to delete",
                        self.id, id
                    );
                }
            }
            SiteReference::Existing(id) => self.restore_existing_site(&mut *admin, id, &host)?,
            SiteReference::Unresolved => {}
        }

        admin.commit().map_err(|err| {
            error!(
                "[session {}] commit after remove for {} failed: {}",
                self.id, host, err
            );
            ValidationError::Commit(err)
        })?;

        self.state.site = SiteReference::Unresolved;
        self.state.displaced = None;
        self.state.phase = SessionPhase::Removed;
        info!("[session {}] removed validation binding for {}", self.id, host);
        Ok(())
    }

    fn resolve_site(
        &mut self,
        admin: &mut dyn AdminClient,
        host: &str,
    ) -> Result<SiteId, ValidationError> {
        match (self.state.site, self.selection) {
            (SiteReference::Existing(id), _) | (SiteReference::Created(id), _) => {
                Self::require_site(admin, self.id, id)
            }
            (SiteReference::Unresolved, SiteSelection::Existing(id)) => {
                let id = Self::require_site(admin, self.id, id)?;
                self.state.site = SiteReference::Existing(id);
                debug!("[session {}] reusing site {} for {}", self.id, id, host);
                Ok(id)
            }
            (SiteReference::Unresolved, SiteSelection::CreateTemporary) => {
                let information =
                    format!("{}:{}:{}", self.options.ip_wildcard, self.options.http_port, host);
                let site = admin.create_site(
                    host,
                    PROTOCOL_HTTP,
                    &information,
                    &self.options.placeholder_path,
                )?;
                self.state.site = SiteReference::Created(site.id);
                info!(
                    "[session {}] created temporary site {} ({}) for {}",
                    self.id, site.id, site.name, host
                );
                Ok(site.id)
            }
        }
    }

    fn require_site(
        admin: &dyn AdminClient,
        session: Uuid,
        id: SiteId,
    ) -> Result<SiteId, ValidationError> {
        if admin.find_site(id).is_none() {
            error!(
                "[session {}] unable to find site {} which is required for validation",
                session, id
            );
            return Err(ValidationError::SiteNotFound(id));
        }
        Ok(id)
    }

    fn restore_existing_site(
        &self,
        admin: &mut dyn AdminClient,
        id: SiteId,
        host: &str,
    ) -> Result<(), ValidationError> {
        let Some(site) = admin.find_site(id) else {
            warn!(
                "[session {}] site {} disappeared before cleanup; nothing to remove",
                self.id, id
            );
            return Ok(());
        };

        if let Some(previous) = &self.state.displaced {
            if let Some(spec) = BindingSpec::restoring(previous) {
                admin.add_or_update_binding(id, &spec)?;
                info!(
                    "[session {}] restored previous binding {} on site {}",
                    self.id, previous, id
                );
                return Ok(());
            }
            warn!(
                "[session {}] previous binding {} carried no certificate; removing it instead",
                self.id, previous
            );
        }

        match site.find_binding(host, self.options.https_port) {
            Some(binding) => {
                admin.remove_binding(id, binding)?;
                info!("[session {}] removed {} from site {}", self.id, binding, id);
            }
            None => debug!(
                "[session {}] no https binding for {} left on site {}",
                self.id, host, id
            ),
        }
        Ok(())
    }
}

fn lock_admin(
    admin: &SharedAdminClient,
) -> Result<MutexGuard<'_, dyn AdminClient + 'static>, ValidationError> {
    admin
        .lock()
        .map_err(|err| ValidationError::Poisoned(err.to_string()))
}
