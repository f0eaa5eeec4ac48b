//! Store trait: the abstract interface for proof persistence.
//!
//! This trait keeps the service storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use cardproof_core::{Anchor, AnchorJob, AnchorState, ContentId, Cosignature, ProofDocument};
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Result of inserting a proof or cosignature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The record was inserted.
    Inserted,
    /// A record with the same key already exists (nothing was written).
    AlreadyExists,
}

/// The Store trait: async interface for proof persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **Immutable bodies**: once stored, a proof's signed body never changes.
///   Only witnesses (anchors, cosignatures) are appended.
/// - **Upsert jobs**: anchor job writes replace the whole record, keyed by
///   proof identifier. Starting a job goes through `queue_anchor_job`, which
///   never replaces an unfinished one.
/// - **Unique cosigners**: at most one cosignature per (proof, cosigner),
///   enforced by the backend itself.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Proof Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a proof document under its identifier.
    ///
    /// Returns `AlreadyExists` without overwriting if the identifier is known.
    async fn put_proof(&self, id: &ContentId, doc: &ProofDocument) -> Result<InsertResult>;

    /// Get a proof by identifier, witnesses included.
    async fn get_proof(&self, id: &ContentId) -> Result<Option<ProofDocument>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Anchor Job Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace the job record for `job.proof_id`.
    async fn upsert_anchor_job(&self, job: &AnchorJob) -> Result<()>;

    /// Write `job` only if the proof has no job or its job has finished.
    ///
    /// Returns `AlreadyExists`, writing nothing, while a `QUEUED` or `POSTED`
    /// record is present. The check and the write are one step, so two
    /// concurrent callers cannot both start a job for the same proof.
    async fn queue_anchor_job(&self, job: &AnchorJob) -> Result<InsertResult>;

    /// Write the confirmed `job` and append `anchor` to its proof, atomically.
    ///
    /// The append is skipped, returning `AlreadyExists`, when the proof
    /// already carries an anchor for the same transaction (see
    /// [`Anchor::same_witness`]); the job record is written either way.
    /// Fails with `NotFound`, writing nothing, if the proof is unknown.
    async fn confirm_anchor(&self, job: &AnchorJob, anchor: &Anchor) -> Result<InsertResult>;

    /// Get the job record for a proof.
    async fn get_anchor_job(&self, id: &ContentId) -> Result<Option<AnchorJob>>;

    /// List job records in a state, oldest queued first.
    async fn list_anchor_jobs(&self, state: AnchorState) -> Result<Vec<AnchorJob>>;

    /// Count an owner's jobs queued at or after `since`.
    async fn count_anchor_jobs_for_owner_since(
        &self,
        owner: &str,
        since: DateTime<Utc>,
    ) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Cosignature Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a cosignature and append it to the stored proof, atomically.
    ///
    /// Returns `AlreadyExists` if this cosigner already cosigned the proof,
    /// `NotFound` if the proof is unknown.
    async fn insert_cosignature(&self, id: &ContentId, entry: &Cosignature)
        -> Result<InsertResult>;

    /// List cosignatures recorded for a proof, in insertion order.
    async fn list_cosignatures(&self, id: &ContentId) -> Result<Vec<Cosignature>>;
}
