//! [`Store`] held entirely in process memory.
//!
//! Mirrors the SQLite backend's duplicate and ordering rules, which lets the
//! service tests run without a database file.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cardproof_core::{Anchor, AnchorJob, AnchorState, ContentId, Cosignature, ProofDocument};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    proofs: HashMap<ContentId, ProofDocument>,
    jobs: HashMap<ContentId, AnchorJob>,
    /// Per proof, oldest first.
    cosignatures: HashMap<ContentId, Vec<Cosignature>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_proof(&self, id: &ContentId, doc: &ProofDocument) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.proofs.contains_key(id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.proofs.insert(*id, doc.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_proof(&self, id: &ContentId) -> Result<Option<ProofDocument>> {
        Ok(self.read()?.proofs.get(id).cloned())
    }

    async fn upsert_anchor_job(&self, job: &AnchorJob) -> Result<()> {
        self.write()?.jobs.insert(job.proof_id, job.clone());
        Ok(())
    }

    async fn queue_anchor_job(&self, job: &AnchorJob) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if let Some(current) = inner.jobs.get(&job.proof_id) {
            if !current.state.is_terminal() {
                return Ok(InsertResult::AlreadyExists);
            }
        }
        inner.jobs.insert(job.proof_id, job.clone());
        Ok(InsertResult::Inserted)
    }

    async fn confirm_anchor(&self, job: &AnchorJob, anchor: &Anchor) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let doc = inner
            .proofs
            .get_mut(&job.proof_id)
            .ok_or_else(|| StoreError::NotFound(job.proof_id.to_string()))?;

        let result = if doc.anchors.iter().any(|a| a.same_witness(anchor)) {
            InsertResult::AlreadyExists
        } else {
            doc.anchors.push(anchor.clone());
            InsertResult::Inserted
        };
        inner.jobs.insert(job.proof_id, job.clone());
        Ok(result)
    }

    async fn get_anchor_job(&self, id: &ContentId) -> Result<Option<AnchorJob>> {
        Ok(self.read()?.jobs.get(id).cloned())
    }

    async fn list_anchor_jobs(&self, state: AnchorState) -> Result<Vec<AnchorJob>> {
        let inner = self.read()?;
        let mut jobs: Vec<AnchorJob> = inner
            .jobs
            .values()
            .filter(|j| j.state == state)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.queued_at);
        Ok(jobs)
    }

    async fn count_anchor_jobs_for_owner_since(
        &self,
        owner: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let inner = self.read()?;
        let count = inner
            .jobs
            .values()
            .filter(|j| j.owner == owner && j.queued_at >= since)
            .count();
        Ok(count as u64)
    }

    async fn insert_cosignature(
        &self,
        id: &ContentId,
        entry: &Cosignature,
    ) -> Result<InsertResult> {
        // One write guard for the whole check-and-insert.
        let mut inner = self.write()?;
        let inner = &mut *inner;

        let doc = inner
            .proofs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let recorded = inner.cosignatures.entry(*id).or_default();

        if recorded.iter().any(|c| c.cosigner == entry.cosigner) {
            return Ok(InsertResult::AlreadyExists);
        }
        recorded.push(entry.clone());
        doc.cosignatures.push(entry.clone());
        Ok(InsertResult::Inserted)
    }

    async fn list_cosignatures(&self, id: &ContentId) -> Result<Vec<Cosignature>> {
        Ok(self
            .read()?
            .cosignatures
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}
