use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tls_site_validation::admin::{
    Binding, InMemoryAdminClient, ServerVersion, SharedAdminClient, Site,
};
use tls_site_validation::storage::MemoryCertificateStore;
use tls_site_validation::{CertificateInfo, SessionFactory, SessionOptions};

pub const HOST: &str = "example.com";

/// A factory wired to an in-memory server the test can still inspect.
pub struct Harness {
    pub admin: Arc<Mutex<InMemoryAdminClient>>,
    pub store: MemoryCertificateStore,
    pub factory: SessionFactory,
}

impl Harness {
    pub fn new(sites: Vec<Site>) -> Self {
        let mut client = InMemoryAdminClient::new(ServerVersion::new(10, 0));
        for site in sites {
            client.seed_site(site);
        }
        let admin = Arc::new(Mutex::new(client));
        let shared: SharedAdminClient = admin.clone();
        let store = MemoryCertificateStore::new();
        let factory = SessionFactory::new(
            shared,
            Arc::new(store.clone()),
            SessionOptions::default(),
        );
        Self {
            admin,
            store,
            factory,
        }
    }

    pub fn admin(&self) -> MutexGuard<'_, InMemoryAdminClient> {
        self.admin.lock().unwrap()
    }

    pub fn live_site(&self, id: u64) -> Option<Site> {
        self.admin().live().site(id).cloned()
    }
}

pub fn binding(protocol: &str, information: &str) -> Binding {
    Binding::parse(protocol, information).unwrap()
}

/// Site 5 with a plain binding for the validated host and an unrelated TLS binding.
pub fn shop_site() -> Site {
    let mut other_tls = binding("https", "*:443:shop.example.net");
    other_tls.certificate_hash = Some(vec![0x77; 32]);
    other_tls.store_name = Some("My".to_string());
    Site {
        id: 5,
        name: "shop".to_string(),
        physical_path: "C:\\inetpub\\shop".to_string(),
        bindings: vec![binding("http", "*:80:example.com"), other_tls],
    }
}

pub fn certificate(hash: u8) -> CertificateInfo {
    CertificateInfo::new(vec![hash; 32], vec![HOST.to_string()])
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "tls-site-validation-it-{}",
        uuid::Uuid::new_v4().as_simple()
    ))
}
