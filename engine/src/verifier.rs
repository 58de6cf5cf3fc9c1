//! Concurrent header verification.
//!
//! A batch of headers is checked by a small pool of worker threads while the
//! caller consumes results. Workers pull header indexes in submission order;
//! a coordinator thread buffers results that finish early and releases them
//! strictly in submission order.
//!
//! ```text
//! jobs (0..n) ──► worker 0 ─┐
//!             ──► worker 1 ─┼─► (index, result) ──► coordinator ──► results, in order
//!             ──► worker k ─┘
//! ```
//!
//! Aborting stops workers from starting new checks and makes the coordinator
//! drop whatever is still buffered. The coordinator joins every worker before
//! closing the result stream, so once the stream ends no worker is running.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use strata_primitives::Header;
use tracing::{debug, warn};

use crate::chain::ChainReader;
use crate::consensus::ConsensusEngine;
use crate::error::ConsensusError;

/// Outcome of verifying one header.
pub type VerificationResult = Result<(), ConsensusError>;

/// Cancels an in-flight batch. Dropping the handle does not cancel.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Stop the batch. Checks already running finish; their results are
    /// discarded.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// In-order stream of verification results.
///
/// Yields exactly one result per submitted header unless the batch was
/// aborted, in which case it ends early.
#[derive(Debug)]
pub struct VerificationResults {
    rx: Receiver<VerificationResult>,
    active: Arc<AtomicUsize>,
}

impl VerificationResults {
    /// Block until the next result, or `None` once the stream is closed.
    pub fn recv(&self) -> Option<VerificationResult> {
        self.rx.recv().ok()
    }

    /// Worker threads of this batch still alive.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Iterator for VerificationResults {
    type Item = VerificationResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Decrements the live-worker count when a worker exits, even by panic.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded pool of header verification workers.
#[derive(Debug, Clone, Copy)]
pub struct HeaderVerifier {
    workers: usize,
}

impl Default for HeaderVerifier {
    /// One worker per CPU.
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl HeaderVerifier {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start verifying `headers` and return immediately.
    ///
    /// Header `i` is checked with `headers[..i]` as its batch parents.
    pub fn verify<E>(
        &self,
        engine: E,
        chain: Arc<dyn ChainReader>,
        headers: Vec<Header>,
    ) -> (AbortHandle, VerificationResults)
    where
        E: ConsensusEngine + 'static,
    {
        let total = headers.len();
        let aborted = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicUsize::new(0));
        let (results_tx, results_rx) = unbounded();

        let (jobs_tx, jobs_rx) = unbounded::<usize>();
        for index in 0..total {
            // Receiver is alive, cannot fail.
            let _ = jobs_tx.send(index);
        }
        drop(jobs_tx);

        let engine = Arc::new(engine);
        let headers = Arc::new(headers);
        let (done_tx, done_rx) = unbounded::<(usize, VerificationResult)>();

        let mut handles = Vec::new();
        for id in 0..self.workers.min(total) {
            active.fetch_add(1, Ordering::SeqCst);
            let guard = ActiveGuard(active.clone());
            let worker = Worker {
                engine: engine.clone(),
                chain: chain.clone(),
                headers: headers.clone(),
                jobs: jobs_rx.clone(),
                done: done_tx.clone(),
                aborted: aborted.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("header-verifier-{id}"))
                .spawn(move || {
                    let _guard = guard;
                    worker.run();
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                // The closure, and with it the guard, was dropped.
                Err(err) => warn!(%err, "failed to spawn header verifier"),
            }
        }
        drop(done_tx);
        debug!(headers = total, workers = handles.len(), "header verification started");

        let coordinator = Coordinator {
            total,
            done: done_rx,
            results: results_tx,
            aborted: aborted.clone(),
            workers: handles,
        };
        let spawned = thread::Builder::new()
            .name("header-verifier-coordinator".into())
            .spawn(move || coordinator.run());
        if let Err(err) = spawned {
            // Workers see the abort flag and exit; the result stream is
            // already closed because the coordinator owned its sender.
            warn!(%err, "failed to spawn header verification coordinator");
            aborted.store(true, Ordering::SeqCst);
        }

        (
            AbortHandle { aborted },
            VerificationResults {
                rx: results_rx,
                active,
            },
        )
    }
}

struct Worker<E> {
    engine: Arc<E>,
    chain: Arc<dyn ChainReader>,
    headers: Arc<Vec<Header>>,
    jobs: Receiver<usize>,
    done: Sender<(usize, VerificationResult)>,
    aborted: Arc<AtomicBool>,
}

impl<E: ConsensusEngine> Worker<E> {
    fn run(self) {
        loop {
            if self.aborted.load(Ordering::SeqCst) {
                return;
            }
            let Ok(index) = self.jobs.try_recv() else {
                return;
            };
            let result =
                self.engine
                    .verify_header(&*self.chain, &self.headers[index], &self.headers[..index]);
            if self.done.send((index, result)).is_err() {
                return;
            }
        }
    }
}

struct Coordinator {
    total: usize,
    done: Receiver<(usize, VerificationResult)>,
    results: Sender<VerificationResult>,
    aborted: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Coordinator {
    fn run(self) {
        let emitted = self.forward_in_order();
        if emitted < self.total {
            // Stop the remaining workers if we are leaving early.
            self.aborted.store(true, Ordering::SeqCst);
        }
        drop(self.done);
        for handle in self.workers {
            if handle.join().is_err() {
                warn!("header verifier panicked");
            }
        }
        debug!(emitted, total = self.total, "header verification finished");
        // Dropping `results` here closes the stream after every worker exited.
    }

    /// Emit results in submission order. Returns how many were emitted.
    fn forward_in_order(&self) -> usize {
        let mut pending: Vec<Option<VerificationResult>> = vec![None; self.total];
        let mut next = 0;
        while next < self.total {
            let Ok((index, result)) = self.done.recv() else {
                // Every worker exited without finishing the batch.
                return next;
            };
            pending[index] = Some(result);

            while let Some(result) = pending.get_mut(next).and_then(Option::take) {
                if self.aborted.load(Ordering::SeqCst) {
                    return next;
                }
                if self.results.send(result).is_err() {
                    // Consumer went away.
                    return next;
                }
                next += 1;
            }
        }
        next
    }
}
