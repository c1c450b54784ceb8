use tls_site_validation::admin::AdminClient;
use tls_site_validation::validation::SessionPhase;
use tls_site_validation::{
    CertificateInfo, SiteReference, SiteSelection, SslFlags, ValidationError, ValidationTarget,
};

use crate::test_utils::{HOST, Harness, binding, certificate, shop_site};

fn target() -> ValidationTarget {
    ValidationTarget::new(HOST).unwrap()
}

#[test]
fn temporary_site_is_created_and_deleted_as_a_whole() {
    let default_site = tls_site_validation::admin::Site {
        id: 1,
        name: "Default Web Site".to_string(),
        physical_path: "C:\\inetpub\\wwwroot".to_string(),
        bindings: vec![binding("http", "*:80:")],
    };
    let harness = Harness::new(vec![default_site.clone()]);
    let cert = certificate(0x10);
    let mut session = harness.factory.create(&target()).unwrap();
    assert_eq!(session.selection(), SiteSelection::CreateTemporary);

    session.install(&cert).unwrap();

    assert_eq!(session.site(), SiteReference::Created(2));
    let site = harness.live_site(2).expect("temporary site committed");
    assert_eq!(site.name, HOST);
    assert_eq!(site.physical_path, "X:\\");
    assert_eq!(site.bindings.len(), 2);
    assert_eq!(site.bindings[0].protocol, "http");
    assert_eq!(site.bindings[0].binding_information(), "*:80:example.com");
    let tls = site.find_binding(HOST, 443).unwrap();
    assert_eq!(tls.certificate_hash, Some(cert.hash.clone()));
    assert_eq!(tls.ssl_flags, SslFlags::SNI | SslFlags::CENTRAL_CERT_STORE);
    assert!(harness.store.contains(&cert));

    session.remove(&cert).unwrap();

    assert!(harness.live_site(2).is_none());
    assert_eq!(harness.live_site(1), Some(default_site));
    assert!(!harness.store.contains(&cert));
    assert_eq!(session.phase(), SessionPhase::Removed);
    assert_eq!(harness.admin().commit_count(), 2);
}

#[test]
fn existing_site_only_loses_the_validation_binding() {
    let harness = Harness::new(vec![shop_site()]);
    let cert = CertificateInfo::new(vec![0x20; 32], vec!["Example.COM".to_string()])
        .with_store_name(Some("WebHosting".to_string()));
    let mut session = harness
        .factory
        .create(&target().with_target_site(Some(5)))
        .unwrap();

    session.install(&cert).unwrap();

    assert_eq!(session.site(), SiteReference::Existing(5));
    assert_eq!(harness.admin().live().sites.len(), 1);
    let site = harness.live_site(5).unwrap();
    assert_eq!(site.bindings.len(), 3);
    let tls = site.find_binding("example.com", 443).unwrap();
    assert_eq!(tls.ssl_flags, SslFlags::SNI);
    assert_eq!(tls.store_name.as_deref(), Some("WebHosting"));
    assert!(session.displaced_binding().is_none());

    session.remove(&cert).unwrap();

    assert_eq!(harness.live_site(5), Some(shop_site()));
}

#[test]
fn installing_twice_rewrites_the_same_binding() {
    let harness = Harness::new(vec![shop_site()]);
    let mut session = harness
        .factory
        .create(&target().with_validation_site(Some(5)))
        .unwrap();

    session.install(&certificate(0x01)).unwrap();
    session.install(&certificate(0x02)).unwrap();

    let site = harness.live_site(5).unwrap();
    let for_host: Vec<_> = site
        .bindings
        .iter()
        .filter(|b| b.serves(HOST, 443))
        .collect();
    assert_eq!(for_host.len(), 1);
    assert_eq!(for_host[0].certificate_hash, Some(vec![0x02; 32]));
    assert!(session.displaced_binding().is_none());

    session.remove(&certificate(0x02)).unwrap();
    assert_eq!(harness.live_site(5), Some(shop_site()));
}

#[test]
fn installing_twice_on_temporary_site_creates_one_site() {
    let harness = Harness::new(vec![]);
    let mut session = harness.factory.create(&target()).unwrap();

    session.install(&certificate(0x01)).unwrap();
    session.install(&certificate(0x02)).unwrap();

    let admin = harness.admin();
    assert_eq!(admin.live().sites.len(), 1);
    let tls: Vec<_> = admin.live().sites[0]
        .bindings
        .iter()
        .filter(|b| b.is_https())
        .collect();
    assert_eq!(tls.len(), 1);
    assert_eq!(tls[0].certificate_hash, Some(vec![0x02; 32]));
}

#[test]
fn remove_before_install_is_a_no_op() {
    let harness = Harness::new(vec![shop_site()]);
    let mut session = harness
        .factory
        .create(&target().with_target_site(Some(5)))
        .unwrap();

    session.remove(&certificate(0x01)).unwrap();

    let admin = harness.admin();
    assert_eq!(admin.commit_count(), 0);
    assert!(!admin.has_pending_changes());
    assert_eq!(admin.live().site(5), Some(&shop_site()));
}

#[test]
fn missing_site_fails_without_side_effects() {
    let harness = Harness::new(vec![shop_site()]);
    let cert = certificate(0x30);
    let mut session = harness
        .factory
        .create(&target().with_target_site(Some(9)))
        .unwrap();

    let err = session.install(&cert).unwrap_err();

    assert!(matches!(err, ValidationError::SiteNotFound(9)));
    let admin = harness.admin();
    assert_eq!(admin.commit_count(), 0);
    assert!(!admin.has_pending_changes());
    assert_eq!(admin.staged().sites.len(), 1);
    assert!(harness.store.is_empty());
    drop(admin);

    session.remove(&cert).unwrap();
    assert_eq!(harness.admin().commit_count(), 0);
}

#[test]
fn failed_commit_still_allows_cleanup() {
    let harness = Harness::new(vec![]);
    let cert = certificate(0x40);
    let mut session = harness.factory.create(&target()).unwrap();
    harness
        .admin()
        .reject_commits(Some("configuration is locked".to_string()));

    let err = session.install(&cert).unwrap_err();

    assert!(matches!(err, ValidationError::Commit(_)));
    assert_eq!(session.site(), SiteReference::Created(1));
    assert_eq!(session.phase(), SessionPhase::Installed);
    assert!(harness.admin().live().sites.is_empty());

    // A failed remove keeps the bookkeeping for another attempt.
    assert!(matches!(
        session.remove(&cert),
        Err(ValidationError::Commit(_))
    ));
    assert_eq!(session.site(), SiteReference::Created(1));

    harness.admin().reject_commits(None);
    session.remove(&cert).unwrap();

    let admin = harness.admin();
    assert!(admin.live().sites.is_empty());
    assert!(admin.staged().sites.is_empty());
    assert!(harness.store.is_empty());
}

#[test]
fn displaced_binding_is_restored_on_remove() {
    let mut site = shop_site();
    let mut original = binding("https", "*:443:example.com");
    original.certificate_hash = Some(vec![0x01; 32]);
    original.store_name = Some("My".to_string());
    original.ssl_flags = SslFlags::SNI;
    site.bindings.push(original.clone());
    let harness = Harness::new(vec![site.clone()]);

    let mut session = harness
        .factory
        .create(&target().with_target_site(Some(5)))
        .unwrap();
    session.install(&certificate(0x02)).unwrap();

    assert_eq!(session.displaced_binding(), Some(&original));
    let live = harness.live_site(5).unwrap();
    assert_eq!(
        live.find_binding(HOST, 443).unwrap().certificate_hash,
        Some(vec![0x02; 32])
    );

    session.remove(&certificate(0x02)).unwrap();
    assert_eq!(harness.live_site(5), Some(site));
}

#[test]
fn cleanup_tolerates_binding_removed_by_someone_else() {
    let harness = Harness::new(vec![shop_site()]);
    let cert = certificate(0x50);
    let mut session = harness
        .factory
        .create(&target().with_target_site(Some(5)))
        .unwrap();
    session.install(&cert).unwrap();

    {
        let mut admin = harness.admin();
        let site = admin.find_site(5).unwrap();
        let ours = site.find_binding(HOST, 443).unwrap().clone();
        assert!(admin.remove_binding(5, &ours).unwrap());
        admin.commit().unwrap();
    }

    session.remove(&cert).unwrap();
    assert_eq!(harness.live_site(5), Some(shop_site()));
}

#[test]
fn cleanup_tolerates_vanished_temporary_site() {
    let harness = Harness::new(vec![]);
    let cert = certificate(0x60);
    let mut session = harness.factory.create(&target()).unwrap();
    session.install(&cert).unwrap();

    {
        let mut admin = harness.admin();
        assert!(admin.delete_site(1).unwrap());
        admin.commit().unwrap();
    }

    session.remove(&cert).unwrap();
    assert!(harness.admin().live().sites.is_empty());
    assert!(!harness.store.contains(&cert));
}

#[test]
fn validation_site_wins_over_deployment_site() {
    let mut validation_site = shop_site();
    validation_site.id = 6;
    validation_site.name = "validation".to_string();
    let harness = Harness::new(vec![shop_site(), validation_site]);
    let mut session = harness
        .factory
        .create(
            &target()
                .with_validation_site(Some(6))
                .with_target_site(Some(5)),
        )
        .unwrap();

    session.install(&certificate(0x70)).unwrap();

    assert_eq!(session.site(), SiteReference::Existing(6));
    assert!(harness.live_site(6).unwrap().find_binding(HOST, 443).is_some());
    assert_eq!(harness.live_site(5), Some(shop_site()));
}

#[test]
fn exhausted_site_ids_fail_install_without_panicking() {
    let mut last = shop_site();
    last.id = u64::MAX;
    let harness = Harness::new(vec![last.clone()]);
    let cert = certificate(0x80);
    let mut session = harness.factory.create(&target()).unwrap();

    let err = session.install(&cert).unwrap_err();

    assert!(matches!(
        err,
        ValidationError::Admin(tls_site_validation::AdminError::InvalidSite(_))
    ));
    assert_eq!(session.site(), SiteReference::Unresolved);
    assert!(harness.store.is_empty());
    assert!(!harness.admin().has_pending_changes());

    session.remove(&cert).unwrap();
    assert_eq!(harness.admin().commit_count(), 0);
    assert_eq!(harness.live_site(u64::MAX), Some(last));
}
