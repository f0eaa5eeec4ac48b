//! A scripted anchor provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cardproof_anchor::{AnchorError, AnchorProvider, JobHandle, ProviderStatus};
use cardproof_core::ContentId;

/// Provider whose behaviour is fixed up front.
///
/// Confirmation is decided by each handle's own poll count; `polls()`
/// totals every job. Status outages are shared across jobs.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    /// Confirm from this poll on (1-based). Zero never confirms.
    confirm_on: usize,
    /// Status polls that fail as unavailable before any other answer.
    outages: AtomicUsize,
    queued: AtomicUsize,
    polls: AtomicUsize,
    per_handle: Mutex<HashMap<JobHandle, usize>>,
}

impl ScriptedProvider {
    /// A provider that accepts jobs and never confirms them.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confirm_on: 0,
            outages: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            per_handle: Mutex::new(HashMap::new()),
        }
    }

    pub fn confirming_on(mut self, poll: usize) -> Self {
        self.confirm_on = poll;
        self
    }

    pub fn with_outages(self, polls: usize) -> Self {
        self.outages.store(polls, Ordering::SeqCst);
        self
    }

    /// Transaction id reported when confirming on `poll`.
    pub fn txid_for(&self, poll: usize) -> String {
        format!("{}-tx-{}", self.name, poll)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnchorProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn queue(&self, proof_id: &ContentId) -> cardproof_anchor::Result<JobHandle> {
        self.queued.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle::new(format!("{}:{}", self.name, proof_id)))
    }

    async fn status(&self, handle: &JobHandle) -> cardproof_anchor::Result<ProviderStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let poll = {
            let mut per_handle = self.per_handle.lock().expect("poll counter lock");
            let n = per_handle.entry(handle.clone()).or_default();
            *n += 1;
            *n
        };

        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(AnchorError::ProviderUnavailable(format!("{} unreachable", self.name)));
        }

        if self.confirm_on != 0 && poll >= self.confirm_on {
            Ok(ProviderStatus::confirmed(Some(self.txid_for(poll))))
        } else {
            Ok(ProviderStatus::posted())
        }
    }
}
