//! Provider abstraction for anchoring.
//!
//! A provider submits a proof identifier to some external witness (a
//! timestamping service, a chain) and reports on its progress. The worker
//! knows nothing about individual providers beyond this trait.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cardproof_core::ContentId;

use crate::builtin::{EvmL2Provider, NoneProvider, OpenTimestampsProvider};
use crate::error::{AnchorError, Result};

/// Opaque provider-assigned job handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-side progress of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Accepted but not yet submitted to the witness.
    Queued,
    /// Submitted, not yet confirmed.
    Posted,
    Confirmed,
    Failed,
}

/// A status report from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub state: ProviderState,
    pub txid: Option<String>,
}

impl ProviderStatus {
    pub fn queued() -> Self {
        Self {
            state: ProviderState::Queued,
            txid: None,
        }
    }

    pub fn posted() -> Self {
        Self {
            state: ProviderState::Posted,
            txid: None,
        }
    }

    pub fn confirmed(txid: Option<String>) -> Self {
        Self {
            state: ProviderState::Confirmed,
            txid,
        }
    }

    pub fn failed() -> Self {
        Self {
            state: ProviderState::Failed,
            txid: None,
        }
    }
}

/// An external witness that anchors proof identifiers.
///
/// Implementations must be thread-safe (Send + Sync). Transport failures
/// should surface as [`AnchorError::ProviderUnavailable`] so the worker can
/// retry them.
#[async_trait]
pub trait AnchorProvider: Send + Sync {
    /// Registry name, also recorded as the anchor's `chain`.
    fn name(&self) -> &str;

    /// Submit a proof identifier.
    async fn queue(&self, proof_id: &ContentId) -> Result<JobHandle>;

    /// Report on a submitted job.
    async fn status(&self, handle: &JobHandle) -> Result<ProviderStatus>;
}

/// Name-indexed set of providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn AnchorProvider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `none`, `opentimestamps` and `evm-l2`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoneProvider));
        registry.register(Arc::new(OpenTimestampsProvider));
        registry.register(Arc::new(EvmL2Provider));
        registry
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn AnchorProvider>) -> Option<Arc<dyn AnchorProvider>> {
        self.providers.insert(provider.name().to_string(), provider)
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn AnchorProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AnchorError::UnknownProvider(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
