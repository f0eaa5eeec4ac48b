//! SQLite schema versioning.
//!
//! `schema_migrations` records every applied version. Opening a database
//! runs the missing steps in one transaction; a database
//! written by a newer build is refused.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

/// Schema steps, index `n` upgrading version `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[V1];

/// Version after every known step has run.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring `conn` up to [`CURRENT_VERSION`]. Running it again is a no-op.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at schema {}, this build knows up to {}",
            applied, CURRENT_VERSION
        )));
    }
    if applied == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (step, sql) in MIGRATIONS.iter().enumerate().skip(applied as usize) {
        let version = step as u32 + 1;
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("v{}: {}", version, e)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().timestamp_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(())
}

const V1: &str = r#"
        -- Published proofs, stored as their full JSON document
        CREATE TABLE proofs (
            proof_id TEXT PRIMARY KEY,        -- base64url multihash
            owner TEXT NOT NULL,              -- claim.owner
            document TEXT NOT NULL,           -- JSON, witnesses included
            created_at INTEGER NOT NULL       -- local time of publication (Unix ms)
        );

        -- One anchoring job per proof
        CREATE TABLE anchor_jobs (
            proof_id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            provider TEXT NOT NULL,
            state TEXT NOT NULL,              -- QUEUED | POSTED | CONFIRMED | FAILED
            job_handle TEXT,
            txid TEXT,
            queued_at INTEGER NOT NULL,       -- Unix ms
            posted_at INTEGER,
            confirmed_at INTEGER
        );

        -- Cosignatures, unique per (proof, cosigner)
        CREATE TABLE cosignatures (
            proof_id TEXT NOT NULL,
            cosigner TEXT NOT NULL,
            alg TEXT NOT NULL,
            signature TEXT NOT NULL,
            public_key TEXT NOT NULL,
            issued_at TEXT NOT NULL,          -- verbatim, part of the signed message
            created_at INTEGER NOT NULL,
            seq INTEGER NOT NULL,             -- insertion order
            PRIMARY KEY (proof_id, cosigner)
        );

        CREATE INDEX idx_proofs_owner ON proofs(owner);
        CREATE INDEX idx_anchor_jobs_state ON anchor_jobs(state);
        CREATE INDEX idx_anchor_jobs_owner_queued ON anchor_jobs(owner, queued_at);
        "#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"proofs".to_string()));
        assert!(tables.contains(&"anchor_jobs".to_string()));
        assert!(tables.contains(&"cosignatures".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
