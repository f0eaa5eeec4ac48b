//! Built-in providers.
//!
//! `none` confirms immediately and is the default. `opentimestamps` and
//! `evm-l2` submit nothing yet; their jobs stay posted until the worker's
//! deadline expires.

use async_trait::async_trait;
use cardproof_core::ContentId;

use crate::error::Result;
use crate::provider::{AnchorProvider, JobHandle, ProviderStatus};

/// Confirms every job on the first poll, with no transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneProvider;

#[async_trait]
impl AnchorProvider for NoneProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn queue(&self, proof_id: &ContentId) -> Result<JobHandle> {
        Ok(JobHandle::new(format!("none:{}", proof_id)))
    }

    async fn status(&self, _handle: &JobHandle) -> Result<ProviderStatus> {
        Ok(ProviderStatus::confirmed(None))
    }
}

/// OpenTimestamps calendar submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTimestampsProvider;

#[async_trait]
impl AnchorProvider for OpenTimestampsProvider {
    fn name(&self) -> &str {
        "opentimestamps"
    }

    async fn queue(&self, proof_id: &ContentId) -> Result<JobHandle> {
        Ok(JobHandle::new(format!("ots:{}", proof_id)))
    }

    // TODO: upgrade pending timestamps against a calendar server once one is configured.
    async fn status(&self, _handle: &JobHandle) -> Result<ProviderStatus> {
        Ok(ProviderStatus::posted())
    }
}

/// Layer-2 EVM transaction carrying the identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmL2Provider;

#[async_trait]
impl AnchorProvider for EvmL2Provider {
    fn name(&self) -> &str {
        "evm-l2"
    }

    async fn queue(&self, proof_id: &ContentId) -> Result<JobHandle> {
        Ok(JobHandle::new(format!("evm:{}", proof_id)))
    }

    async fn status(&self, handle: &JobHandle) -> Result<ProviderStatus> {
        Ok(ProviderStatus {
            txid: Some(handle.to_string()),
            ..ProviderStatus::posted()
        })
    }
}
