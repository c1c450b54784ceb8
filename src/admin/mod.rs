use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::core::types::SiteId;

mod json_file;
mod memory;
pub mod model;

pub use json_file::JsonFileAdminClient;
pub use memory::InMemoryAdminClient;
pub use model::{Binding, BindingChange, BindingSpec, ServerModel, ServerVersion, Site};

/// Errors produced by web server administration backends.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("site not found: {0}")]
    SiteNotFound(SiteId),
    #[error("invalid site: {0}")]
    InvalidSite(String),
    #[error("invalid binding information: {0}")]
    InvalidBinding(String),
    #[error("commit rejected: {0}")]
    Commit(String),
    #[error("server configuration error: {0}")]
    Persist(String),
}

/// Mutable view of a web server's sites and bindings.
///
/// Mutating calls only change the client's in-memory model; nothing reaches
/// the live server until [`AdminClient::commit`] succeeds.
pub trait AdminClient: Send {
    fn server_version(&self) -> ServerVersion;

    fn list_sites(&self) -> Vec<Site>;

    /// Creates a site with a single initial binding and returns it with its generated id.
    fn create_site(
        &mut self,
        name: &str,
        protocol: &str,
        binding_information: &str,
        physical_path: &str,
    ) -> Result<Site, AdminError>;

    /// Returns false when no site with `id` exists.
    fn delete_site(&mut self, id: SiteId) -> Result<bool, AdminError>;

    /// Updates the https binding for `spec.host` and `spec.port` in place, or adds one.
    fn add_or_update_binding(
        &mut self,
        site: SiteId,
        spec: &BindingSpec,
    ) -> Result<BindingChange, AdminError>;

    /// Returns false when the binding was not present on the site.
    fn remove_binding(&mut self, site: SiteId, binding: &Binding) -> Result<bool, AdminError>;

    fn commit(&mut self) -> Result<(), AdminError>;

    fn find_site(&self, id: SiteId) -> Option<Site> {
        self.list_sites().into_iter().find(|site| site.id == id)
    }
}

/// Admin client shared between the factory and the sessions it creates.
pub type SharedAdminClient = Arc<Mutex<dyn AdminClient>>;

pub fn share<A: AdminClient + 'static>(client: A) -> SharedAdminClient {
    Arc::new(Mutex::new(client))
}
