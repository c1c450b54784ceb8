use std::fs;
use std::sync::Arc;

use tls_site_validation::admin::{
    AdminClient, JsonFileAdminClient, ServerModel, ServerVersion, share,
};
use tls_site_validation::storage::SqliteCertificateStore;
use tls_site_validation::{
    CertificateInfo, SessionFactory, SessionOptions, SslFlags, ValidationError, ValidationTarget,
};

use crate::test_utils::{scratch_dir, shop_site};

fn self_signed(host: &str) -> CertificateInfo {
    let key = rcgen::generate_simple_self_signed(vec![host.to_string()]).unwrap();
    CertificateInfo::from_pem(&key.cert.pem()).unwrap()
}

#[test]
fn file_backed_server_round_trips_a_validation() {
    let dir = scratch_dir();
    fs::create_dir_all(&dir).unwrap();
    let server_path = dir.join("server.json");
    let mut model = ServerModel::new(ServerVersion::new(10, 0));
    model.sites.push(shop_site());
    JsonFileAdminClient::create(&server_path, model).unwrap();

    let store = SqliteCertificateStore::open(&dir.join("certificates.sqlite")).unwrap();
    let factory = SessionFactory::new(
        share(JsonFileAdminClient::open(&server_path).unwrap()),
        Arc::new(store.clone()),
        SessionOptions::default(),
    );
    assert!(factory.can_validate());

    let cert = self_signed("Validation.Example.com");
    let mut session = factory
        .create(&ValidationTarget::new("validation.example.com").unwrap())
        .unwrap();
    session.install(&cert).unwrap();

    let on_disk = JsonFileAdminClient::open(&server_path).unwrap().list_sites();
    assert_eq!(on_disk.len(), 2);
    let temporary = on_disk
        .iter()
        .find(|site| site.name == "validation.example.com")
        .unwrap();
    let tls = temporary
        .find_binding("validation.example.com", 443)
        .unwrap();
    assert_eq!(tls.certificate_hash, Some(cert.hash.clone()));
    assert_eq!(tls.ssl_flags, SslFlags::SNI | SslFlags::CENTRAL_CERT_STORE);

    let stored = store.get(&cert.thumbprint()).unwrap().unwrap();
    assert_eq!(stored.host_names, cert.host_names);
    assert_eq!(stored.certificate_pem, cert.pem);

    session.remove(&cert).unwrap();

    let on_disk = JsonFileAdminClient::open(&server_path).unwrap().list_sites();
    assert_eq!(on_disk, vec![shop_site()]);
    assert!(store.get(&cert.thumbprint()).unwrap().is_none());
    assert!(store.list().unwrap().is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn old_server_is_refused_before_any_session_exists() {
    let dir = scratch_dir();
    fs::create_dir_all(&dir).unwrap();
    let server_path = dir.join("server.json");
    JsonFileAdminClient::create(&server_path, ServerModel::new(ServerVersion::new(7, 5)))
        .unwrap();

    let factory = SessionFactory::new(
        share(JsonFileAdminClient::open(&server_path).unwrap()),
        Arc::new(SqliteCertificateStore::open_in_memory().unwrap()),
        SessionOptions::default(),
    );

    assert!(!factory.can_validate());
    let err = factory
        .create(&ValidationTarget::new("example.com").unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, ValidationError::Ineligible { required: 8, .. }));

    let _ = fs::remove_dir_all(&dir);
}
