//! Persistence for published proofs, anchoring jobs and cosignatures.
//!
//! [`Store`] is the seam the service talks to. [`SqliteStore`] keeps state
//! across restarts so a posted anchoring job can be resumed; [`MemoryStore`]
//! backs tests and short-lived services.
//!
//! ```rust,no_run
//! use cardproof_core::AnchorState;
//! use cardproof_store::{SqliteStore, Store};
//!
//! # async fn open() -> cardproof_store::Result<()> {
//! let store = SqliteStore::open("cardproof.db")?;
//! let pending = store.list_anchor_jobs(AnchorState::Posted).await?;
//! # let _ = pending;
//! # Ok(())
//! # }
//! ```
//!
//! Stored documents only grow: anchors and cosignatures are appended to a
//! proof's witnesses. A second proof under the same identifier, or a second
//! cosignature from the same identity, comes back as
//! [`InsertResult::AlreadyExists`].

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store};
