//! # CardProof Anchor
//!
//! Pluggable anchoring for CardProof: providers that submit proof identifiers
//! to an external witness, and the worker that drives each job to a terminal
//! state.
//!
//! ## Key Types
//!
//! - [`AnchorProvider`] - Trait for external witnesses
//! - [`ProviderRegistry`] - Name-indexed providers
//! - [`AnchorWorker`] / [`WorkerHandle`] - Bounded job pool with shutdown
//! - [`AnchorEvent`] - Broadcast on every persisted transition
//!
//! ## Adding a provider
//!
//! Implement [`AnchorProvider`] and register it; the worker needs no changes.
//! Report transport failures as [`AnchorError::ProviderUnavailable`] to have
//! them retried until the job's deadline.

pub mod builtin;
pub mod error;
pub mod provider;
pub mod worker;

pub use builtin::{EvmL2Provider, NoneProvider, OpenTimestampsProvider};
pub use error::{AnchorError, Result};
pub use provider::{AnchorProvider, JobHandle, ProviderRegistry, ProviderState, ProviderStatus};
pub use worker::{AnchorEvent, AnchorWorker, WorkerConfig, WorkerHandle};
