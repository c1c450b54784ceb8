use log::{debug, warn};

use super::{
    AdminClient, AdminError, Binding, BindingChange, BindingSpec, ServerModel, ServerVersion, Site,
};
use crate::core::types::SiteId;

/// Admin client whose "live server" is a second in-memory model.
///
/// Mutations land on the staged model; `commit` copies it over the live one.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdminClient {
    live: ServerModel,
    staged: ServerModel,
    commits: usize,
    reject_commits: Option<String>,
}

impl InMemoryAdminClient {
    pub fn new(version: ServerVersion) -> Self {
        Self::from_model(ServerModel::new(version))
    }

    pub fn from_model(model: ServerModel) -> Self {
        Self {
            live: model.clone(),
            staged: model,
            commits: 0,
            reject_commits: None,
        }
    }

    /// Adds a site directly to both staged and live state.
    pub fn seed_site(&mut self, site: Site) {
        self.staged.sites.push(site.clone());
        self.live.sites.push(site);
    }

    /// Makes every following commit fail with `reason` until cleared with `None`.
    pub fn reject_commits(&mut self, reason: Option<String>) {
        self.reject_commits = reason;
    }

    pub fn live(&self) -> &ServerModel {
        &self.live
    }

    pub fn staged(&self) -> &ServerModel {
        &self.staged
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn has_pending_changes(&self) -> bool {
        self.live != self.staged
    }
}

impl AdminClient for InMemoryAdminClient {
    fn server_version(&self) -> ServerVersion {
        self.live.version
    }

    fn list_sites(&self) -> Vec<Site> {
        self.staged.sites.clone()
    }

    fn create_site(
        &mut self,
        name: &str,
        protocol: &str,
        binding_information: &str,
        physical_path: &str,
    ) -> Result<Site, AdminError> {
        self.staged
            .create_site(name, protocol, binding_information, physical_path)
    }

    fn delete_site(&mut self, id: SiteId) -> Result<bool, AdminError> {
        Ok(self.staged.delete_site(id))
    }

    fn add_or_update_binding(
        &mut self,
        site: SiteId,
        spec: &BindingSpec,
    ) -> Result<BindingChange, AdminError> {
        self.staged.add_or_update_binding(site, spec)
    }

    fn remove_binding(&mut self, site: SiteId, binding: &Binding) -> Result<bool, AdminError> {
        self.staged.remove_binding(site, binding)
    }

    fn commit(&mut self) -> Result<(), AdminError> {
        if let Some(reason) = &self.reject_commits {
            warn!("[admin] in-memory commit rejected: {reason}");
            return Err(AdminError::Commit(reason.clone()));
        }
        self.live = self.staged.clone();
        self.commits += 1;
        debug!(
            "[admin] in-memory commit #{} applied ({} site(s))",
            self.commits,
            self.live.sites.len()
        );
        Ok(())
    }
}
