use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use super::{
    AdminClient, AdminError, Binding, BindingChange, BindingSpec, ServerModel, ServerVersion, Site,
};
use crate::core::types::SiteId;

/// Admin client for a server whose configuration lives in a JSON document.
///
/// The document is read once on open; mutations stay in memory and `commit`
/// replaces the file atomically through a sibling temp file.
pub struct JsonFileAdminClient {
    path: PathBuf,
    staged: ServerModel,
}

impl JsonFileAdminClient {
    pub fn open(path: &Path) -> Result<Self, AdminError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AdminError::Persist(format!("failed to read {}: {err}", path.display()))
        })?;
        let staged: ServerModel = serde_json::from_str(&raw).map_err(|err| {
            AdminError::Persist(format!("failed to parse {}: {err}", path.display()))
        })?;
        debug!(
            "[admin] loaded {} site(s) from {} (server {})",
            staged.sites.len(),
            path.display(),
            staged.version
        );
        Ok(Self {
            path: path.to_path_buf(),
            staged,
        })
    }

    /// Writes `model` as a new document, replacing any existing file.
    pub fn create(path: &Path, model: ServerModel) -> Result<Self, AdminError> {
        let mut client = Self {
            path: path.to_path_buf(),
            staged: model,
        };
        client.commit()?;
        Ok(client)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "server.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl AdminClient for JsonFileAdminClient {
    fn server_version(&self) -> ServerVersion {
        self.staged.version
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
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                AdminError::Commit(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let body = serde_json::to_string_pretty(&self.staged)
            .map_err(|err| AdminError::Commit(format!("failed to serialize model: {err}")))?;

        let temp = self.temp_path();
        fs::write(&temp, body).map_err(|err| {
            AdminError::Commit(format!("failed to write {}: {err}", temp.display()))
        })?;
        fs::rename(&temp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&temp);
            AdminError::Commit(format!(
                "failed to replace {} with {}: {err}",
                self.path.display(),
                temp.display()
            ))
        })?;
        info!(
            "[admin] committed {} site(s) to {}",
            self.staged.sites.len(),
            self.path.display()
        );
        Ok(())
    }
}
