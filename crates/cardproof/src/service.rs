//! The proof service: unified API for CardProof.
//!
//! The service brings together storage, the anchor worker and the cosign
//! protocol behind one interface. Signing happens client-side with
//! [`ProofBuilder`](cardproof_core::ProofBuilder); the service only accepts
//! documents whose identifier and owner signature check out.

use std::sync::Arc;
use std::time::Duration;

use cardproof_anchor::{AnchorEvent, AnchorWorker, ProviderRegistry, WorkerHandle};
use cardproof_core::cosign::{authorize, check_issued_at, parse_cosigner_key, verify_cosignature};
use cardproof_core::time::now_millis;
use cardproof_core::verify::{document_tier, owner_signature_valid};
use cardproof_core::{
    cosign_message, verify_proof_with, AnchorJob, AnchorState, Content, ContentId, Cosignature,
    ProofDocument, SignedProof, Tier, VerifyReport,
};
use cardproof_store::{InsertResult, Store};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::directory::{ContentFetcher, KeyDirectory, StaticContentFetcher, StaticKeyDirectory};
use crate::error::{Result, ServiceError};

/// A request to add a cosignature to a published proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignRequest {
    pub proof_id: ContentId,
    /// Identity of the cosigner.
    pub cosigner: String,
    /// RFC 3339 timestamp the cosigner signed, verbatim.
    pub issued_at: String,
    /// base64url signature over the cosign message.
    pub signature: String,
    /// Multibase or base64 key; resolved through the directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// An accepted cosignature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CosignOutcome {
    pub proof_id: ContentId,
    /// The proof's tier after the cosignature was recorded.
    pub tier: Tier,
}

/// An accepted anchor request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorTicket {
    pub proof_id: ContentId,
    pub provider: String,
    pub state: AnchorState,
}

/// Builder for [`ProofService`].
pub struct ServiceBuilder<S: Store + 'static> {
    store: S,
    config: ServiceConfig,
    registry: ProviderRegistry,
    directory: Arc<dyn KeyDirectory>,
    fetcher: Arc<dyn ContentFetcher>,
}

impl<S: Store + 'static> ServiceBuilder<S> {
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the provider registry (built-ins by default).
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn KeyDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Start the anchor worker and return the running service.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> ProofService<S> {
        let store = Arc::new(self.store);
        let registry = Arc::new(self.registry);
        let worker =
            AnchorWorker::new(store.clone(), registry.clone(), self.config.worker.clone()).spawn();

        info!(
            providers = ?registry.names(),
            default_provider = %self.config.default_provider,
            "proof service started"
        );

        ProofService {
            store,
            registry,
            worker,
            directory: self.directory,
            fetcher: self.fetcher,
            config: self.config,
        }
    }
}

/// The main service.
///
/// Provides a unified API for:
/// - Publishing and fetching proofs
/// - Verifying proofs against content
/// - Requesting and tracking anchors
/// - Accepting cosignatures
pub struct ProofService<S: Store + 'static> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    worker: WorkerHandle,
    directory: Arc<dyn KeyDirectory>,
    fetcher: Arc<dyn ContentFetcher>,
    config: ServiceConfig,
}

impl<S: Store + 'static> ProofService<S> {
    /// Start a service with built-in providers and empty collaborators.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self::builder(store).config(config).start()
    }

    pub fn builder(store: S) -> ServiceBuilder<S> {
        ServiceBuilder {
            store,
            config: ServiceConfig::default(),
            registry: ProviderRegistry::with_builtins(),
            directory: Arc::new(StaticKeyDirectory::new()),
            fetcher: Arc::new(StaticContentFetcher::new()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Proof Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Publish a signed proof under its identifier.
    ///
    /// The identifier must be the one derived from the document and the owner
    /// signature must verify. Witnesses cannot be published; they are added
    /// through [`request_anchor`](Self::request_anchor) and
    /// [`cosign`](Self::cosign). Publishing the same proof twice is a no-op.
    pub async fn publish(&self, doc: &ProofDocument, id: &ContentId) -> Result<InsertResult> {
        let actual = ContentId::of(doc)?;
        if actual != *id {
            return Err(ServiceError::IdentifierMismatch {
                derived: actual,
                given: *id,
            });
        }
        if !owner_signature_valid(doc) {
            return Err(ServiceError::InvalidProof(
                "owner signature does not verify".to_string(),
            ));
        }
        if !doc.anchors.is_empty() || !doc.cosignatures.is_empty() {
            return Err(ServiceError::InvalidProof(
                "witnesses cannot be published with the document".to_string(),
            ));
        }

        let result = self.store.put_proof(id, doc).await?;
        match result {
            InsertResult::Inserted => info!(proof_id = %id, owner = doc.owner(), "proof published"),
            InsertResult::AlreadyExists => debug!(proof_id = %id, "proof already published"),
        }
        Ok(result)
    }

    /// Publish the output of [`ProofBuilder::sign`](cardproof_core::ProofBuilder::sign).
    pub async fn publish_signed(&self, signed: &SignedProof) -> Result<InsertResult> {
        self.publish(&signed.document, &signed.id).await
    }

    /// Get a proof by identifier, witnesses included.
    pub async fn get_proof(&self, id: &ContentId) -> Result<ProofDocument> {
        self.store
            .get_proof(id)
            .await?
            .ok_or(ServiceError::ProofNotFound(*id))
    }

    /// Verify a published proof.
    ///
    /// When `content` is omitted it is fetched from `resource.url`. A proof
    /// that fails verification is a report with `valid == false`, not an
    /// error.
    pub async fn verify(&self, id: &ContentId, content: Option<Content>) -> Result<VerifyReport> {
        let doc = self.get_proof(id).await?;

        let content = match content {
            Some(content) => content,
            None => self.fetch(&doc.resource.url).await?,
        };

        let report = verify_proof_with(&doc, &content, &self.config.html_policy);
        match &report.error {
            None => debug!(proof_id = %id, tier = %report.tier, "proof verified"),
            Some(failure) => info!(proof_id = %id, %failure, "proof failed verification"),
        }
        Ok(report)
    }

    /// Current tier of a published proof from its signature and witnesses.
    pub async fn tier(&self, id: &ContentId) -> Result<Tier> {
        Ok(document_tier(&self.get_proof(id).await?))
    }

    async fn fetch(&self, url: &str) -> Result<Content> {
        self.fetcher
            .fetch(url)
            .await
            .map_err(|e| ServiceError::Fetch {
                url: url.to_string(),
                reason: format!("{e:#}"),
            })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Anchor Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a proof for anchoring.
    ///
    /// Only the owner may anchor. A job already in flight is returned as is.
    /// Otherwise the owner's daily quota is checked before anything is
    /// written; a finished job is replaced.
    pub async fn request_anchor(
        &self,
        id: &ContentId,
        provider: Option<&str>,
        owner: &str,
    ) -> Result<AnchorTicket> {
        let doc = self.get_proof(id).await?;
        if doc.owner() != owner {
            return Err(ServiceError::NotOwner {
                proof_id: *id,
                caller: owner.to_string(),
            });
        }

        let provider = provider.unwrap_or(self.config.default_provider.as_str());
        self.registry.get(provider)?;

        if let Some(job) = self.store.get_anchor_job(id).await? {
            if !job.state.is_terminal() {
                debug!(proof_id = %id, provider = %job.provider, state = %job.state, "anchor already in flight");
                return Ok(AnchorTicket {
                    proof_id: *id,
                    provider: job.provider,
                    state: job.state,
                });
            }
        }

        let now = now_millis();
        let day_start = utc_day_start(now);
        let used = self
            .store
            .count_anchor_jobs_for_owner_since(owner, day_start)
            .await?;
        if used >= u64::from(self.config.anchors_per_day) {
            let retry_after = (day_start + chrono::Duration::days(1) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            warn!(owner, used, limit = self.config.anchors_per_day, "anchor quota exceeded");
            return Err(ServiceError::QuotaExceeded {
                limit: self.config.anchors_per_day,
                retry_after,
            });
        }

        let job = AnchorJob::queued(*id, owner, provider, now);
        if self.store.queue_anchor_job(&job).await? == InsertResult::AlreadyExists {
            // Another request started a job since the check above.
            let current = self
                .store
                .get_anchor_job(id)
                .await?
                .ok_or_else(|| ServiceError::ProofNotFound(*id))?;
            debug!(proof_id = %id, provider = %current.provider, state = %current.state, "anchor already in flight");
            return Ok(AnchorTicket {
                proof_id: *id,
                provider: current.provider,
                state: current.state,
            });
        }
        self.worker.enqueue(*id).await?;

        info!(proof_id = %id, provider, "anchor queued");
        Ok(AnchorTicket {
            proof_id: *id,
            provider: provider.to_string(),
            state: AnchorState::Queued,
        })
    }

    /// The anchor job record for a proof, if any.
    pub async fn anchor_status(&self, id: &ContentId) -> Result<Option<AnchorJob>> {
        Ok(self.store.get_anchor_job(id).await?)
    }

    /// Hand every unfinished job back to the worker, normally once after start.
    ///
    /// Jobs left `POSTED` resume polling with their stored handle. A job the
    /// worker is already driving is not started a second time.
    pub async fn resume_anchors(&self) -> Result<usize> {
        let mut resumed = 0;
        for state in [AnchorState::Queued, AnchorState::Posted] {
            for job in self.store.list_anchor_jobs(state).await? {
                self.worker.enqueue(job.proof_id).await?;
                resumed += 1;
            }
        }
        if resumed > 0 {
            info!(resumed, "resumed unfinished anchor jobs");
        }
        Ok(resumed)
    }

    /// Receive every anchor job transition persisted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AnchorEvent> {
        self.worker.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cosign Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a cosignature to a published proof.
    ///
    /// Checks run in order: replay window, key resolution, signature,
    /// authorization, uniqueness. The first failure is returned.
    pub async fn cosign(&self, request: CosignRequest) -> Result<CosignOutcome> {
        let CosignRequest {
            proof_id,
            cosigner,
            issued_at,
            signature,
            public_key,
        } = request;
        let policy = &self.config.cosign;

        let now = now_millis();
        if let Err(rejection) = check_issued_at(&issued_at, now, policy) {
            warn!(proof_id = %proof_id, cosigner = %cosigner, issued_at = %issued_at, "cosign timestamp outside window");
            return Err(rejection.into());
        }

        let doc = self.get_proof(&proof_id).await?;
        let message = cosign_message(&proof_id, doc.owner(), &issued_at);

        let key = match public_key {
            Some(key) => parse_cosigner_key(&key)?,
            None => self.directory.resolve(&cosigner).await.map_err(|e| {
                ServiceError::DidResolveFailed {
                    cosigner: cosigner.clone(),
                    reason: format!("{e:#}"),
                }
            })?,
        };

        if let Err(rejection) = verify_cosignature(&message, &signature, &key) {
            warn!(proof_id = %proof_id, cosigner = %cosigner, "cosignature does not verify");
            return Err(rejection.into());
        }
        authorize(&doc.claim, &cosigner, policy)?;

        // The store's unique key is authoritative; this only skips the write.
        let duplicate = doc.cosignatures.iter().any(|c| c.cosigner == cosigner);
        let entry = Cosignature::accepted(cosigner.as_str(), signature, &key, issued_at, now);
        if duplicate
            || self.store.insert_cosignature(&proof_id, &entry).await? == InsertResult::AlreadyExists
        {
            debug!(proof_id = %proof_id, cosigner = %cosigner, "duplicate cosignature");
            return Err(ServiceError::AlreadyCosigned { proof_id, cosigner });
        }

        let tier = self.tier(&proof_id).await?;
        info!(proof_id = %proof_id, cosigner = %cosigner, %tier, "cosignature accepted");
        Ok(CosignOutcome { proof_id, tier })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Stop the anchor worker. In-flight jobs stop after their current step
    /// and stay resumable.
    pub async fn shutdown(self) {
        self.worker.shutdown().await;
    }

    /// Stop accepting anchor jobs and wait for in-flight ones to finish.
    pub async fn drain(self) {
        self.worker.drain().await;
    }
}

/// Midnight UTC of the day containing `at`.
fn utc_day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_day_start() {
        let at = Utc.with_ymd_and_hms(2025, 1, 14, 17, 45, 3).unwrap();
        assert_eq!(
            utc_day_start(at),
            Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap()
        );
        assert_eq!(utc_day_start(utc_day_start(at)), utc_day_start(at));
    }

    #[test]
    fn test_cosign_request_wire_shape() {
        let json = r#"{
            "proof_id": "EiCYz-SeiwuWc0dRykkJmmTaBkk5HywfTnRp6VOC5uVARQ",
            "cosigner": "did:cc:bob",
            "issued_at": "2025-01-14T12:00:00.000Z",
            "signature": "c2ln"
        }"#;
        let request: CosignRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.cosigner, "did:cc:bob");
        assert!(request.public_key.is_none());
    }
}
