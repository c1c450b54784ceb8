use anyhow::{Context, Result};
use rusqlite::Connection;

/// Creates the certificate table when the database is new.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS validation_certificates (
            thumbprint TEXT PRIMARY KEY,
            store_name TEXT,
            host_names TEXT NOT NULL,
            certificate_pem TEXT,
            saved_at TEXT NOT NULL,
            save_count INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .context("failed to create validation_certificates table")?;
    Ok(())
}
