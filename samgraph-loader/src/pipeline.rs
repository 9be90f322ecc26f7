//! Batching, commit pool and abort/retry handling.
//!
//! Producers hand [`MutationRequest`] batches to a bounded channel. A
//! dispatcher task spawns one commit per batch, bounded by a semaphore pool.
//! Conflict-classified failures move the batch to a retry task with a
//! widening randomized backoff; a raised stop signal abandons outstanding
//! retries, which then surface in the terminal error.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use samgraph_core::{GraphStore, MutateStats, MutationRequest, StoreError, StoreResult};
use tokio::sync::{mpsc, watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{LoaderError, Result};
use crate::export::RdfSink;

/// Default edges per mutation batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Default committer pool size.
pub const DEFAULT_COMMITTERS: usize = 4;

/// Count of handed-off batches not yet confirmed committed. A batch is
/// counted the moment the dispatcher dequeues it and discounted only on a
/// successful commit, so batches killed mid-commit or abandoned in retry
/// stay counted. A non-zero count at the end of a run means data was handed
/// off but never confirmed committed.
#[derive(Clone, Default)]
pub struct AbortCounter {
    count: Arc<AtomicU32>,
}

impl AbortCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn dec(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

/// One-way stop signal shared by producers, committers and retry tasks.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        StopSignal {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Raise the signal; idempotent.
    pub fn raise(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is raised.
    pub async fn raised(&self) {
        let mut rx = self.rx.clone();
        // the sender lives as long as any clone of self, so this cannot fail
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

/// Where committed batches go.
#[derive(Clone)]
pub enum CommitSink {
    Store(Arc<dyn GraphStore>),
    Export(Arc<RdfSink>),
}

impl CommitSink {
    pub(crate) async fn commit(&self, req: &MutationRequest) -> StoreResult<MutateStats> {
        match self {
            CommitSink::Store(store) => store.mutate(req).await,
            CommitSink::Export(sink) => sink
                .write(req)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent commit workers
    pub committers: usize,
    /// Bounded channel capacity; a full channel blocks producers
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            committers: DEFAULT_COMMITTERS,
            queue_depth: DEFAULT_COMMITTERS,
        }
    }
}

/// Totals reported once the pipeline has drained.
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub commits: u64,
    pub edges: u64,
    pub retried: u64,
}

/// The running commit pool.
///
/// Producers send through [`CommitPipeline::sender`]; dropping every sender
/// and awaiting [`CommitPipeline::drain`] waits for in-flight commits and
/// retries, unless the stop signal abandons them first.
pub struct CommitPipeline {
    tx: mpsc::Sender<MutationRequest>,
    dispatcher: JoinHandle<()>,
    shared: Arc<Shared>,
}

struct Shared {
    sink: CommitSink,
    stop: StopSignal,
    aborts: AbortCounter,
    commits: AtomicU64,
    edges: AtomicU64,
    retried: AtomicU64,
    /// First fatal (non-conflict) store error
    fatal: Mutex<Option<StoreError>>,
}

impl CommitPipeline {
    pub fn start(
        sink: CommitSink,
        config: &PipelineConfig,
        stop: StopSignal,
        aborts: AbortCounter,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let shared = Arc::new(Shared {
            sink,
            stop: stop.clone(),
            aborts: aborts.clone(),
            commits: AtomicU64::new(0),
            edges: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            fatal: Mutex::new(None),
        });
        let dispatcher = tokio::spawn(dispatch(rx, shared.clone(), config.committers.max(1)));
        CommitPipeline {
            tx,
            dispatcher,
            shared,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<MutationRequest> {
        self.tx.clone()
    }

    /// Close the channel and wait for the dispatcher to finish. Returns the
    /// commit totals, or the first fatal store error.
    pub async fn drain(self) -> Result<PipelineStats> {
        drop(self.tx);
        // dispatcher never panics; it exits on channel close or stop
        let _ = self.dispatcher.await;
        if let Some(err) = self.shared.fatal.lock().await.take() {
            return Err(err.into());
        }
        Ok(PipelineStats {
            commits: self.shared.commits.load(Ordering::Relaxed),
            edges: self.shared.edges.load(Ordering::Relaxed),
            retried: self.shared.retried.load(Ordering::Relaxed),
        })
    }
}

async fn dispatch(mut rx: mpsc::Receiver<MutationRequest>, shared: Arc<Shared>, committers: usize) {
    let semaphore = Arc::new(Semaphore::new(committers));
    let mut tasks = JoinSet::new();
    while let Some(req) = rx.recv().await {
        // counted as unconfirmed from dequeue until a commit lands
        shared.aborts.inc();
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };
        let shared = shared.clone();
        tasks.spawn(async move {
            commit_one(&shared, req, permit).await;
        });
    }
    // all producers done; wait for in-flight commits and retries, or abandon
    // them when the stop signal is raised
    let stop = shared.stop.clone();
    loop {
        tokio::select! {
            joined = tasks.join_next() => {
                if joined.is_none() {
                    break;
                }
            }
            _ = stop.raised() => {
                warn!(outstanding = tasks.len(), "stop raised, abandoning in-flight commits");
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                break;
            }
        }
    }
    info!(
        commits = shared.commits.load(Ordering::Relaxed),
        edges = shared.edges.load(Ordering::Relaxed),
        "commit pipeline drained"
    );
}

async fn commit_one(shared: &Shared, req: MutationRequest, permit: OwnedSemaphorePermit) {
    match shared.sink.commit(&req).await {
        Ok(stats) => {
            shared.aborts.dec();
            record(shared, &stats);
        }
        Err(err) if err.is_conflict() => {
            warn!(edges = req.set.len(), %err, "commit conflict, moving batch to retry");
            shared.retried.fetch_add(1, Ordering::Relaxed);
            // free the committer slot for the whole backoff
            drop(permit);
            retry_until_stopped(shared, req).await;
        }
        Err(err) => fatal(shared, err).await,
    }
}

/// Retry a conflicted batch until it lands or the stop signal abandons it.
/// The abort count stays raised for an abandoned batch.
async fn retry_until_stopped(shared: &Shared, req: MutationRequest) {
    let mut attempt: u64 = 1;
    loop {
        let secs = rand::thread_rng().gen_range(attempt..2 * attempt + 9);
        debug!(attempt, delay_secs = secs, "backing off before retry");
        tokio::select! {
            _ = shared.stop.raised() => {
                warn!(attempt, edges = req.set.len(), "abandoning conflicted batch");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
        match shared.sink.commit(&req).await {
            Ok(stats) => {
                info!(attempt, edges = stats.edges, "conflicted batch committed");
                shared.aborts.dec();
                record(shared, &stats);
                return;
            }
            Err(err) if err.is_conflict() => {
                attempt += 1;
            }
            Err(err) => {
                fatal(shared, err).await;
                return;
            }
        }
    }
}

fn record(shared: &Shared, stats: &MutateStats) {
    let commits = shared.commits.fetch_add(1, Ordering::Relaxed) + 1;
    let edges = shared.edges.fetch_add(stats.edges as u64, Ordering::Relaxed) + stats.edges as u64;
    debug!(commits, edges_total = edges, edges = stats.edges, "committed mutation");
}

async fn fatal(shared: &Shared, err: StoreError) {
    error!(%err, "fatal store error, stopping run");
    let mut slot = shared.fatal.lock().await;
    if slot.is_none() {
        *slot = Some(err);
    }
    shared.stop.raise();
}

/// Accumulates row output into batches and ships them when full.
pub struct Batcher {
    tx: mpsc::Sender<MutationRequest>,
    stop: StopSignal,
    batch_size: usize,
    upserts: std::collections::BTreeMap<String, String>,
    set: Vec<samgraph_core::NQuad>,
}

impl Batcher {
    pub fn new(tx: mpsc::Sender<MutationRequest>, stop: StopSignal, batch_size: usize) -> Self {
        Batcher {
            tx,
            stop,
            batch_size: batch_size.max(1),
            upserts: Default::default(),
            set: Vec::new(),
        }
    }

    /// Add one row's output; ships the in-progress batch once it reaches the
    /// batch size.
    pub async fn push(&mut self, out: crate::transform::RowNquads) -> Result<()> {
        self.upserts.extend(out.upserts);
        self.set.extend(out.nquads);
        if self.set.len() < self.batch_size {
            return Ok(());
        }
        self.ship().await
    }

    /// Ship whatever is pending; called at end of file.
    pub async fn flush(&mut self) -> Result<()> {
        if self.set.is_empty() {
            return Ok(());
        }
        self.ship().await
    }

    async fn ship(&mut self) -> Result<()> {
        let req = MutationRequest::new(&self.upserts, std::mem::take(&mut self.set));
        self.upserts.clear();
        tokio::select! {
            _ = self.stop.raised() => Err(LoaderError::Interrupted),
            sent = self.tx.send(req) => sent.map_err(|_| LoaderError::Interrupted),
        }
    }
}
