//! SQLite-backed store of record for validation certificates.
//!
//! Every certificate a session exposes is saved here under its thumbprint
//! and removed again when the session cleans up, so a leftover row means a
//! validation that never finished its removal.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{OptionalExtension, Row, params};

use super::db::Db;
use super::store::{CertificateStore, CertificateStoreError};
use crate::core::certificate::CertificateInfo;

/// A certificate row as persisted by [`SqliteCertificateStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCertificate {
    pub thumbprint: String,
    pub store_name: Option<String>,
    pub host_names: Vec<String>,
    pub certificate_pem: Option<String>,
    pub saved_at: DateTime<Utc>,
    /// How many times the same thumbprint was saved.
    pub save_count: i64,
}

#[derive(Clone)]
pub struct SqliteCertificateStore {
    db: Db,
}

impl SqliteCertificateStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Db::open(path)?;
        info!("[cert-store] using {}", path.display());
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Db::open_in_memory()?,
        })
    }

    pub fn get(&self, thumbprint: &str) -> Result<Option<StoredCertificate>> {
        let conn = self.db.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT thumbprint, store_name, host_names, certificate_pem, saved_at, save_count
            FROM validation_certificates
            WHERE thumbprint = ?1
            "#,
        )?;
        let raw = stmt
            .query_row(params![thumbprint.to_uppercase()], Self::read_row)
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    /// Lists leftover certificates, oldest first.
    pub fn list(&self) -> Result<Vec<StoredCertificate>> {
        let conn = self.db.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT thumbprint, store_name, host_names, certificate_pem, saved_at, save_count
            FROM validation_certificates
            ORDER BY saved_at ASC
            "#,
        )?;
        let rows = stmt.query_map([], Self::read_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(Self::decode(row?)?);
        }
        Ok(records)
    }

    fn save_record(&self, certificate: &CertificateInfo) -> Result<()> {
        let conn = self.db.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO validation_certificates (
                thumbprint, store_name, host_names, certificate_pem, saved_at, save_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1)
            ON CONFLICT(thumbprint) DO UPDATE SET
                store_name = excluded.store_name,
                host_names = excluded.host_names,
                certificate_pem = COALESCE(excluded.certificate_pem, certificate_pem),
                saved_at = excluded.saved_at,
                save_count = save_count + 1
            "#,
            params![
                certificate.thumbprint(),
                certificate.store_name,
                serde_json::to_string(&certificate.host_names)?,
                certificate.pem,
                now,
            ],
        )?;
        Ok(())
    }

    fn delete_record(&self, thumbprint: &str) -> Result<usize> {
        let conn = self.db.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM validation_certificates WHERE thumbprint = ?1",
            params![thumbprint],
        )?;
        Ok(deleted)
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            thumbprint: row.get(0)?,
            store_name: row.get(1)?,
            host_names: row.get(2)?,
            certificate_pem: row.get(3)?,
            saved_at: row.get(4)?,
            save_count: row.get(5)?,
        })
    }

    fn decode(raw: RawRow) -> Result<StoredCertificate> {
        Ok(StoredCertificate {
            thumbprint: raw.thumbprint,
            store_name: raw.store_name,
            host_names: serde_json::from_str(&raw.host_names)
                .context("failed to deserialize host_names")?,
            certificate_pem: raw.certificate_pem,
            saved_at: DateTime::parse_from_rfc3339(&raw.saved_at)
                .map(|dt| dt.with_timezone(&Utc))
                .context("failed to parse saved_at")?,
            save_count: raw.save_count,
        })
    }
}

struct RawRow {
    thumbprint: String,
    store_name: Option<String>,
    host_names: String,
    certificate_pem: Option<String>,
    saved_at: String,
    save_count: i64,
}

impl CertificateStore for SqliteCertificateStore {
    fn save(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError> {
        self.save_record(certificate)
            .map_err(|err| CertificateStoreError::Store(format!("{err:#}")))?;
        debug!("[cert-store] saved {}", certificate.thumbprint());
        Ok(())
    }

    fn delete(&self, certificate: &CertificateInfo) -> Result<(), CertificateStoreError> {
        let thumbprint = certificate.thumbprint();
        let deleted = self
            .delete_record(&thumbprint)
            .map_err(|err| CertificateStoreError::Store(format!("{err:#}")))?;
        if deleted == 0 {
            debug!("[cert-store] {thumbprint} was not stored; nothing to delete");
        } else {
            debug!("[cert-store] deleted {thumbprint}");
        }
        Ok(())
    }
}
