pub mod certificates;
pub mod db;
pub mod memory;
pub mod schema;
pub mod store;

pub use certificates::{SqliteCertificateStore, StoredCertificate};
pub use memory::MemoryCertificateStore;
pub use store::{CertificateStore, CertificateStoreError};
