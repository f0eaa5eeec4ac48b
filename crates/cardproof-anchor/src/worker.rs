//! Anchor job worker.
//!
//! Drives each queued proof through its provider to a terminal state:
//!
//! ```text
//! QUEUED ──queue()──► POSTED ──status() = confirmed──► CONFIRMED
//!                        │
//!                        └──timeout / provider failure / error──► FAILED
//! ```
//!
//! Jobs run concurrently up to `concurrency`, one task per job. Every
//! persisted transition is broadcast as an [`AnchorEvent`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use cardproof_core::time::now_millis;
use cardproof_core::{Anchor, AnchorJob, AnchorState, ContentId};
use cardproof_store::{InsertResult, Store};
use tokio::sync::{broadcast, mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{AnchorError, Result};
use crate::provider::{JobHandle, ProviderRegistry, ProviderState};

/// Capacity of the event broadcast channel. Slow subscribers lag.
const EVENT_CAPACITY: usize = 1024;

/// Configuration for the anchor worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Jobs driven at the same time.
    pub concurrency: usize,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// How long a job may take before it is marked failed.
    pub max_wait: Duration,
    /// Pending identifiers buffered before `enqueue` waits.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_millis(1500),
            max_wait: Duration::from_secs(600),
            queue_capacity: 256,
        }
    }
}

/// A persisted job transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorEvent {
    pub proof_id: ContentId,
    pub provider: String,
    pub state: AnchorState,
    pub txid: Option<String>,
}

/// How a job's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Confirmed,
    Rejected,
    TimedOut,
    Stopped,
}

/// The anchor worker, before it is started.
pub struct AnchorWorker<S: Store + 'static> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    config: WorkerConfig,
}

impl<S: Store + 'static> AnchorWorker<S> {
    pub fn new(store: Arc<S>, registry: Arc<ProviderRegistry>, config: WorkerConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Start the dispatcher on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (stop, stop_rx) = watch::channel(false);

        let ctx = Arc::new(JobContext {
            store: self.store,
            registry: self.registry,
            config: self.config,
            events: events.clone(),
        });
        let dispatcher = tokio::spawn(dispatch(ctx, receiver, stop_rx));

        WorkerHandle {
            sender,
            events,
            stop,
            dispatcher,
        }
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    sender: mpsc::Sender<ContentId>,
    events: broadcast::Sender<AnchorEvent>,
    stop: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl WorkerHandle {
    /// Hand a proof to the worker. Its job record must already exist.
    pub async fn enqueue(&self, proof_id: ContentId) -> Result<()> {
        self.sender
            .send(proof_id)
            .await
            .map_err(|_| AnchorError::WorkerStopped)
    }

    /// Receive every transition persisted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AnchorEvent> {
        self.events.subscribe()
    }

    /// Stop accepting work, interrupt in-flight jobs after their current step
    /// and wait for them. Interrupted jobs stay `POSTED` (or `QUEUED`).
    pub async fn shutdown(self) {
        let Self {
            sender,
            stop,
            dispatcher,
            ..
        } = self;

        let _ = stop.send(true);
        drop(sender);
        if let Err(e) = dispatcher.await {
            error!(error = %e, "anchor dispatcher panicked");
        }
        info!("anchor worker shut down");
    }

    /// Stop accepting work and wait for every accepted job to finish.
    pub async fn drain(self) {
        let Self {
            sender,
            stop,
            dispatcher,
            ..
        } = self;

        drop(sender);
        if let Err(e) = dispatcher.await {
            error!(error = %e, "anchor dispatcher panicked");
        }
        drop(stop);
        info!("anchor worker drained");
    }
}

/// Resolve once a stop has been requested.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            // Handle dropped without shutdown: never stop from here.
            std::future::pending::<()>().await;
        }
    }
}

/// Run jobs until stopped, or until the queue closes and every job is done.
///
/// A proof is driven by at most one task. An identifier that arrives while
/// its job is running is held back and run again once that task ends; the
/// rerun finds the record terminal and returns, unless it was requeued.
async fn dispatch<S: Store + 'static>(
    ctx: Arc<JobContext<S>>,
    mut receiver: mpsc::Receiver<ContentId>,
    mut stop: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(ctx.config.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut running: HashSet<ContentId> = HashSet::new();
    let mut rerun: HashSet<ContentId> = HashSet::new();
    let mut ready: VecDeque<ContentId> = VecDeque::new();
    let mut open = true;

    loop {
        let proof_id = match ready.pop_front() {
            Some(id) => id,
            None => {
                if !open && tasks.is_empty() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = stopped(&mut stop) => break,
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        match joined {
                            Ok(id) => {
                                running.remove(&id);
                                if rerun.remove(&id) {
                                    ready.push_back(id);
                                }
                            }
                            Err(e) => error!(error = %e, "anchor job task panicked"),
                        }
                        continue;
                    }
                    next = receiver.recv(), if open => match next {
                        Some(id) => id,
                        None => {
                            open = false;
                            continue;
                        }
                    },
                }
            }
        };

        if !running.insert(proof_id) {
            debug!(proof_id = %proof_id, "anchor job already running, deferring");
            rerun.insert(proof_id);
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = stopped(&mut stop) => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let ctx = ctx.clone();
        let job_stop = stop.clone();
        tasks.spawn(async move {
            let _permit = permit;
            // The inner task may panic; the outer one always hands the id back.
            let job = tokio::spawn(async move { ctx.run_job(proof_id, job_stop).await });
            if let Err(e) = job.await {
                error!(proof_id = %proof_id, error = %e, "anchor job task panicked");
            }
            proof_id
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "anchor job task panicked");
        }
    }
}

struct JobContext<S: Store + 'static> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    config: WorkerConfig,
    events: broadcast::Sender<AnchorEvent>,
}

impl<S: Store + 'static> JobContext<S> {
    async fn run_job(&self, proof_id: ContentId, mut stop: watch::Receiver<bool>) {
        let started = Instant::now();

        let mut job = match self.store.get_anchor_job(&proof_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(proof_id = %proof_id, "no anchor job record, skipping");
                return;
            }
            Err(e) => {
                error!(proof_id = %proof_id, error = %e, "failed to load anchor job");
                return;
            }
        };
        if job.state.is_terminal() {
            debug!(proof_id = %proof_id, state = %job.state, "anchor job already terminal");
            return;
        }

        info!(proof_id = %proof_id, provider = %job.provider, state = %job.state, "processing anchor job");

        let outcome = self.drive(&mut job, &mut stop).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Outcome::Confirmed) => {
                info!(
                    proof_id = %proof_id,
                    provider = %job.provider,
                    txid = ?job.txid,
                    elapsed_ms,
                    "anchor confirmed"
                );
            }
            Ok(Outcome::Stopped) => {
                info!(proof_id = %proof_id, state = %job.state, elapsed_ms, "anchor job interrupted");
            }
            Ok(Outcome::TimedOut) => {
                warn!(proof_id = %proof_id, provider = %job.provider, elapsed_ms, "anchor job failed (timeout)");
                self.fail(&mut job).await;
            }
            Ok(Outcome::Rejected) => {
                warn!(proof_id = %proof_id, provider = %job.provider, elapsed_ms, "provider reported failure");
                self.fail(&mut job).await;
            }
            Err(e) => {
                error!(proof_id = %proof_id, provider = %job.provider, error = %e, elapsed_ms, "anchor job error");
                self.fail(&mut job).await;
            }
        }
    }

    async fn drive(&self, job: &mut AnchorJob, stop: &mut watch::Receiver<bool>) -> Result<Outcome> {
        let provider = self.registry.get(&job.provider)?;
        let deadline = Instant::now() + self.config.max_wait;

        let resumable = job.resumable_with(provider.name()).map(JobHandle::new);
        let handle = match resumable {
            Some(handle) => {
                debug!(proof_id = %job.proof_id, handle = %handle, "resuming posted anchor job");
                handle
            }
            None => {
                let handle = loop {
                    match provider.queue(&job.proof_id).await {
                        Ok(handle) => break handle,
                        Err(e) if e.is_transient() => {
                            warn!(proof_id = %job.proof_id, provider = %job.provider, error = %e, "queue failed, retrying");
                        }
                        Err(e) => return Err(e),
                    }
                    if Instant::now() >= deadline {
                        return Ok(Outcome::TimedOut);
                    }
                    if self.pause(stop).await {
                        return Ok(Outcome::Stopped);
                    }
                };

                job.state = AnchorState::Posted;
                job.job_handle = Some(handle.to_string());
                job.posted_at = Some(now_millis());
                job.txid = None;
                job.confirmed_at = None;
                self.persist(job).await?;
                handle
            }
        };

        loop {
            if *stop.borrow() {
                return Ok(Outcome::Stopped);
            }

            match provider.status(&handle).await {
                Ok(status) => match status.state {
                    ProviderState::Confirmed => {
                        self.confirm(job, status.txid).await?;
                        return Ok(Outcome::Confirmed);
                    }
                    ProviderState::Failed => return Ok(Outcome::Rejected),
                    ProviderState::Queued | ProviderState::Posted => {
                        debug!(proof_id = %job.proof_id, handle = %handle, state = ?status.state, "anchor still pending");
                    }
                },
                Err(e) if e.is_transient() => {
                    warn!(proof_id = %job.proof_id, provider = %job.provider, error = %e, "status poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Ok(Outcome::TimedOut);
            }
            if self.pause(stop).await {
                return Ok(Outcome::Stopped);
            }
        }
    }

    /// Sleep one poll interval. Returns true if a stop was requested meanwhile.
    async fn pause(&self, stop: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            biased;
            _ = stopped(stop) => true,
            _ = sleep(self.config.poll_interval) => false,
        }
    }

    async fn confirm(&self, job: &mut AnchorJob, txid: Option<String>) -> Result<()> {
        let at = now_millis();
        let anchor = Anchor {
            chain: Some(job.provider.clone()),
            txid: txid.clone(),
            at: Some(at),
        };
        job.state = AnchorState::Confirmed;
        job.txid = txid;
        job.confirmed_at = Some(at);

        if self.store.confirm_anchor(job, &anchor).await? == InsertResult::AlreadyExists {
            debug!(proof_id = %job.proof_id, txid = ?job.txid, "anchor already recorded");
        }
        self.announce(job);
        Ok(())
    }

    async fn fail(&self, job: &mut AnchorJob) {
        job.state = AnchorState::Failed;
        if let Err(e) = self.persist(job).await {
            error!(proof_id = %job.proof_id, error = %e, "failed to record anchor failure");
        }
    }

    async fn persist(&self, job: &AnchorJob) -> Result<()> {
        self.store.upsert_anchor_job(job).await?;
        debug!(proof_id = %job.proof_id, state = %job.state, "anchor job persisted");
        self.announce(job);
        Ok(())
    }

    fn announce(&self, job: &AnchorJob) {
        // No subscribers is fine.
        let _ = self.events.send(AnchorEvent {
            proof_id: job.proof_id,
            provider: job.provider.clone(),
            state: job.state,
            txid: job.txid.clone(),
        });
    }
}
