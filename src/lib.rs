//! Temporary TLS bindings for domain-control validation.
//!
//! A [`validation::SessionFactory`] checks that the web server can host SNI
//! bindings and hands out one [`validation::ValidationSession`] per
//! validation attempt. The session installs the certificate on the validated
//! host name, and removal puts the server back the way it found it.

pub mod admin;
pub mod config;
pub mod core;
pub mod domain;
pub mod storage;
pub mod validation;

pub use admin::{AdminClient, AdminError, SharedAdminClient};
pub use crate::core::certificate::CertificateInfo;
pub use crate::core::types::{SiteId, SiteReference, SiteSelection, SslFlags, ValidationTarget};
pub use storage::{CertificateStore, CertificateStoreError};
pub use validation::{SessionFactory, SessionOptions, ValidationError, ValidationSession};
