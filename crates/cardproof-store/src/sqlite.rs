//! Durable [`Store`] on a single SQLite connection.
//!
//! Calls are moved onto tokio's blocking pool; the connection sits behind a
//! mutex so only one statement runs at a time.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use cardproof_core::{
    Anchor, AnchorJob, AnchorState, ContentId, Cosignature, ProofDocument, SignatureAlg,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A private database that disappears when the store is dropped.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        // A panicking closure leaves the mutex poisoned, so report it the same way.
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|_| StoreError::Poisoned)?
    }
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn millis_to_datetime(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn optional_millis(idx: usize, ms: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ms.map(|ms| millis_to_datetime(idx, ms)).transpose()
}

// Columns: proof_id, owner, provider, state, job_handle, txid, queued_at, posted_at, confirmed_at
fn row_to_job(row: &Row<'_>) -> rusqlite::Result<AnchorJob> {
    let proof_id: String = row.get(0)?;
    let state: String = row.get(3)?;

    Ok(AnchorJob {
        proof_id: proof_id.parse().map_err(|e| conversion_error(0, e))?,
        owner: row.get(1)?,
        provider: row.get(2)?,
        state: state.parse().map_err(|e| conversion_error(3, e))?,
        job_handle: row.get(4)?,
        txid: row.get(5)?,
        queued_at: millis_to_datetime(6, row.get(6)?)?,
        posted_at: optional_millis(7, row.get(7)?)?,
        confirmed_at: optional_millis(8, row.get(8)?)?,
    })
}

// Columns: cosigner, alg, signature, public_key, issued_at, created_at
fn row_to_cosignature(row: &Row<'_>) -> rusqlite::Result<Cosignature> {
    let alg: String = row.get(1)?;
    let alg = match alg.as_str() {
        "Ed25519" => SignatureAlg::Ed25519,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                1,
                format!("alg {}", other),
                Type::Text,
            ))
        }
    };

    Ok(Cosignature {
        cosigner: row.get(0)?,
        alg,
        signature: row.get(2)?,
        public_key: row.get(3)?,
        issued_at: row.get(4)?,
        created_at: millis_to_datetime(5, row.get(5)?)?,
    })
}

/// Load a stored document inside an open connection or transaction.
fn load_document(conn: &Connection, id: &str) -> Result<Option<ProofDocument>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT document FROM proofs WHERE proof_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    json.map(|j| ProofDocument::from_json(j.as_bytes()).map_err(StoreError::from))
        .transpose()
}

fn save_document(conn: &Connection, id: &str, doc: &ProofDocument) -> Result<()> {
    let json = serde_json::to_string(doc)?;
    conn.execute(
        "UPDATE proofs SET document = ?2 WHERE proof_id = ?1",
        params![id, json],
    )?;
    Ok(())
}

const UPSERT_JOB: &str = "INSERT INTO anchor_jobs (
        proof_id, owner, provider, state, job_handle, txid,
        queued_at, posted_at, confirmed_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(proof_id) DO UPDATE SET
        owner = excluded.owner,
        provider = excluded.provider,
        state = excluded.state,
        job_handle = excluded.job_handle,
        txid = excluded.txid,
        queued_at = excluded.queued_at,
        posted_at = excluded.posted_at,
        confirmed_at = excluded.confirmed_at";

fn write_job(conn: &Connection, job: &AnchorJob) -> Result<()> {
    conn.execute(
        UPSERT_JOB,
        params![
            job.proof_id.to_string(),
            job.owner,
            job.provider,
            job.state.as_str(),
            job.job_handle,
            job.txid,
            job.queued_at.timestamp_millis(),
            job.posted_at.map(|t| t.timestamp_millis()),
            job.confirmed_at.map(|t| t.timestamp_millis()),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_proof(&self, id: &ContentId, doc: &ProofDocument) -> Result<InsertResult> {
        let id = id.to_string();
        let owner = doc.claim.owner.clone();
        let json = serde_json::to_string(doc)?;

        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO proofs (proof_id, owner, document, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, owner, json, Utc::now().timestamp_millis()],
            )?;

            if changed == 0 {
                return Ok(InsertResult::AlreadyExists);
            }
            tracing::debug!(proof_id = %id, "stored proof");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_proof(&self, id: &ContentId) -> Result<Option<ProofDocument>> {
        let id = id.to_string();
        self.run(move |conn| load_document(conn, &id)).await
    }

    async fn upsert_anchor_job(&self, job: &AnchorJob) -> Result<()> {
        let job = job.clone();

        self.run(move |conn| {
            write_job(conn, &job)?;
            tracing::debug!(proof_id = %job.proof_id, state = %job.state, "upserted anchor job");
            Ok(())
        })
        .await
    }

    async fn queue_anchor_job(&self, job: &AnchorJob) -> Result<InsertResult> {
        let job = job.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                &format!("{} WHERE anchor_jobs.state IN (?10, ?11)", UPSERT_JOB),
                params![
                    job.proof_id.to_string(),
                    job.owner,
                    job.provider,
                    job.state.as_str(),
                    job.job_handle,
                    job.txid,
                    job.queued_at.timestamp_millis(),
                    job.posted_at.map(|t| t.timestamp_millis()),
                    job.confirmed_at.map(|t| t.timestamp_millis()),
                    AnchorState::Confirmed.as_str(),
                    AnchorState::Failed.as_str(),
                ],
            )?;

            if changed == 0 {
                tracing::debug!(proof_id = %job.proof_id, "anchor job already in flight");
                return Ok(InsertResult::AlreadyExists);
            }
            tracing::debug!(proof_id = %job.proof_id, provider = %job.provider, "queued anchor job");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn confirm_anchor(&self, job: &AnchorJob, anchor: &Anchor) -> Result<InsertResult> {
        let job = job.clone();
        let anchor = anchor.clone();

        self.run(move |conn| {
            let id = job.proof_id.to_string();
            let tx = conn.transaction()?;
            let mut doc = load_document(&tx, &id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;

            let result = if doc.anchors.iter().any(|a| a.same_witness(&anchor)) {
                InsertResult::AlreadyExists
            } else {
                doc.anchors.push(anchor);
                save_document(&tx, &id, &doc)?;
                InsertResult::Inserted
            };
            write_job(&tx, &job)?;
            tx.commit()?;

            tracing::debug!(proof_id = %id, anchors = doc.anchors.len(), ?result, "confirmed anchor");
            Ok(result)
        })
        .await
    }

    async fn get_anchor_job(&self, id: &ContentId) -> Result<Option<AnchorJob>> {
        let id = id.to_string();

        self.run(move |conn| {
            conn.query_row(
                "SELECT proof_id, owner, provider, state, job_handle, txid,
                        queued_at, posted_at, confirmed_at
                 FROM anchor_jobs WHERE proof_id = ?1",
                params![id],
                row_to_job,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_anchor_jobs(&self, state: AnchorState) -> Result<Vec<AnchorJob>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT proof_id, owner, provider, state, job_handle, txid,
                        queued_at, posted_at, confirmed_at
                 FROM anchor_jobs WHERE state = ?1
                 ORDER BY queued_at",
            )?;

            let jobs = stmt
                .query_map(params![state.as_str()], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(jobs)
        })
        .await
    }

    async fn count_anchor_jobs_for_owner_since(
        &self,
        owner: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let owner = owner.to_string();

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM anchor_jobs WHERE owner = ?1 AND queued_at >= ?2",
                params![owner, since.timestamp_millis()],
                |row| row.get(0),
            )?;

            u64::try_from(count).map_err(|_| StoreError::InvalidData(format!("count {}", count)))
        })
        .await
    }

    async fn insert_cosignature(
        &self,
        id: &ContentId,
        entry: &Cosignature,
    ) -> Result<InsertResult> {
        let id = id.to_string();
        let entry = entry.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut doc = load_document(&tx, &id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;

            let changed = tx.execute(
                "INSERT OR IGNORE INTO cosignatures (
                    proof_id, cosigner, alg, signature, public_key, issued_at, created_at, seq
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM cosignatures WHERE proof_id = ?1)
                )",
                params![
                    id,
                    entry.cosigner,
                    entry.alg.to_string(),
                    entry.signature,
                    entry.public_key,
                    entry.issued_at,
                    entry.created_at.timestamp_millis(),
                ],
            )?;

            if changed == 0 {
                return Ok(InsertResult::AlreadyExists);
            }

            doc.cosignatures.push(entry);
            save_document(&tx, &id, &doc)?;
            tx.commit()?;

            tracing::debug!(proof_id = %id, "recorded cosignature");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn list_cosignatures(&self, id: &ContentId) -> Result<Vec<Cosignature>> {
        let id = id.to_string();

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cosigner, alg, signature, public_key, issued_at, created_at
                 FROM cosignatures WHERE proof_id = ?1
                 ORDER BY seq",
            )?;

            let entries = stmt
                .query_map(params![id], row_to_cosignature)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(entries)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardproof_core::time::now_millis;
    use cardproof_core::{CanonMode, Keypair, ProofBuilder, SignedProof};
    use chrono::Duration;

    fn make_proof(owner: &str, content: &str) -> SignedProof {
        ProofBuilder::new("https://example.com/a", content, "text/plain", CanonMode::Bytes, owner)
            .sign(&Keypair::generate())
            .unwrap()
    }

    fn cosignature(cosigner: &str) -> Cosignature {
        Cosignature::accepted(
            cosigner,
            "c2ln",
            &Keypair::generate().public_key(),
            "2025-01-14T12:00:00.000Z",
            now_millis(),
        )
    }

    #[tokio::test]
    async fn test_put_and_get_proof() {
        let store = SqliteStore::open_memory().unwrap();
        let proof = make_proof("did:cc:alice", "hello");

        let result = store.put_proof(&proof.id, &proof.document).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);

        let retrieved = store.get_proof(&proof.id).await.unwrap().unwrap();
        assert_eq!(retrieved, proof.document);

        let missing = ContentId::from_serialized(b"missing");
        assert!(store.get_proof(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_proof_idempotent() {
        let store = SqliteStore::open_memory().unwrap();
        let proof = make_proof("did:cc:alice", "hello");

        store.put_proof(&proof.id, &proof.document).await.unwrap();
        let again = store.put_proof(&proof.id, &proof.document).await.unwrap();
        assert_eq!(again, InsertResult::AlreadyExists);
    }

    #[tokio::test]
    async fn test_confirm_anchor_records_transaction_once() {
        let store = SqliteStore::open_memory().unwrap();
        let proof = make_proof("did:cc:alice", "hello");
        store.put_proof(&proof.id, &proof.document).await.unwrap();

        let mut job = AnchorJob::queued(proof.id, "did:cc:alice", "none", now_millis());
        job.state = AnchorState::Confirmed;
        job.txid = Some("tx1".into());
        job.confirmed_at = Some(now_millis());
        let anchor = Anchor {
            chain: Some("none".into()),
            txid: Some("tx1".into()),
            at: job.confirmed_at,
        };

        assert_eq!(store.confirm_anchor(&job, &anchor).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.confirm_anchor(&job, &anchor).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let doc = store.get_proof(&proof.id).await.unwrap().unwrap();
        assert_eq!(doc.anchors, vec![anchor]);
        assert_eq!(doc.content_id().unwrap(), proof.id);
        assert_eq!(store.get_anchor_job(&proof.id).await.unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn test_confirm_anchor_writes_nothing_without_proof() {
        let store = SqliteStore::open_memory().unwrap();
        let missing = ContentId::from_serialized(b"missing");
        let mut job = AnchorJob::queued(missing, "did:cc:alice", "none", now_millis());
        job.state = AnchorState::Confirmed;

        assert!(matches!(
            store.confirm_anchor(&job, &Anchor::default()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get_anchor_job(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queue_anchor_job_only_replaces_finished_jobs() {
        let store = SqliteStore::open_memory().unwrap();
        let id = ContentId::from_serialized(b"p");
        let first = AnchorJob::queued(id, "did:cc:alice", "none", now_millis());
        let retry = AnchorJob::queued(id, "did:cc:alice", "opentimestamps", now_millis());

        assert_eq!(store.queue_anchor_job(&first).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.queue_anchor_job(&retry).await.unwrap(), InsertResult::AlreadyExists);

        let mut posted = first.clone();
        posted.state = AnchorState::Posted;
        posted.job_handle = Some("none:1".into());
        store.upsert_anchor_job(&posted).await.unwrap();
        assert_eq!(store.queue_anchor_job(&retry).await.unwrap(), InsertResult::AlreadyExists);
        assert_eq!(store.get_anchor_job(&id).await.unwrap().unwrap(), posted);

        let mut failed = posted;
        failed.state = AnchorState::Failed;
        store.upsert_anchor_job(&failed).await.unwrap();
        assert_eq!(store.queue_anchor_job(&retry).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.get_anchor_job(&id).await.unwrap().unwrap(), retry);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queue_anchor_job_single_winner() {
        let store = std::sync::Arc::new(SqliteStore::open_memory().unwrap());
        let id = ContentId::from_serialized(b"p");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let job = AnchorJob::queued(id, "did:cc:alice", "none", now_millis());
                store.queue_anchor_job(&job).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertResult::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn test_anchor_job_upsert_last_writer_wins() {
        let store = SqliteStore::open_memory().unwrap();
        let id = ContentId::from_serialized(b"p");
        let mut job = AnchorJob::queued(id, "did:cc:alice", "none", now_millis());

        store.upsert_anchor_job(&job).await.unwrap();
        job.state = AnchorState::Posted;
        job.job_handle = Some("none:1".into());
        job.posted_at = Some(now_millis());
        store.upsert_anchor_job(&job).await.unwrap();

        let retrieved = store.get_anchor_job(&id).await.unwrap().unwrap();
        assert_eq!(retrieved, job);

        assert!(store.list_anchor_jobs(AnchorState::Queued).await.unwrap().is_empty());
        assert_eq!(store.list_anchor_jobs(AnchorState::Posted).await.unwrap(), vec![job]);
    }

    #[tokio::test]
    async fn test_count_jobs_since() {
        let store = SqliteStore::open_memory().unwrap();
        let now = now_millis();

        for i in 0..3u8 {
            let job = AnchorJob::queued(ContentId::from_serialized(&[i]), "did:cc:alice", "none", now);
            store.upsert_anchor_job(&job).await.unwrap();
        }
        let old = AnchorJob::queued(
            ContentId::from_serialized(b"old"),
            "did:cc:alice",
            "none",
            now - Duration::days(2),
        );
        store.upsert_anchor_job(&old).await.unwrap();
        let other = AnchorJob::queued(ContentId::from_serialized(b"bob"), "did:cc:bob", "none", now);
        store.upsert_anchor_job(&other).await.unwrap();

        let since = now - Duration::hours(1);
        assert_eq!(store.count_anchor_jobs_for_owner_since("did:cc:alice", since).await.unwrap(), 3);
        assert_eq!(store.count_anchor_jobs_for_owner_since("did:cc:bob", since).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cosignature_unique_per_cosigner() {
        let store = SqliteStore::open_memory().unwrap();
        let proof = make_proof("did:cc:alice", "hello");
        store.put_proof(&proof.id, &proof.document).await.unwrap();

        let first = cosignature("did:cc:bob");
        assert_eq!(
            store.insert_cosignature(&proof.id, &first).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.insert_cosignature(&proof.id, &cosignature("did:cc:bob")).await.unwrap(),
            InsertResult::AlreadyExists
        );
        store.insert_cosignature(&proof.id, &cosignature("did:cc:carol")).await.unwrap();

        let listed = store.list_cosignatures(&proof.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], first);
        assert_eq!(listed[1].cosigner, "did:cc:carol");

        let doc = store.get_proof(&proof.id).await.unwrap().unwrap();
        assert_eq!(doc.cosignatures, listed);
    }

    #[tokio::test]
    async fn test_cosignature_requires_proof() {
        let store = SqliteStore::open_memory().unwrap();
        let missing = ContentId::from_serialized(b"missing");
        assert!(matches!(
            store.insert_cosignature(&missing, &cosignature("did:cc:bob")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.list_cosignatures(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardproof.db");
        let proof = make_proof("did:cc:alice", "persist me");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_proof(&proof.id, &proof.document).await.unwrap();
            let job = AnchorJob::queued(proof.id, "did:cc:alice", "ots", now_millis());
            store.upsert_anchor_job(&job).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_proof(&proof.id).await.unwrap().unwrap(), proof.document);
        assert_eq!(
            store.get_anchor_job(&proof.id).await.unwrap().unwrap().provider,
            "ots"
        );
    }
}
