//! Import event hooks.
//!
//! The processor and importer report what they did through an
//! [`ImportObserver`], so counters and metrics live outside the core.

use std::sync::atomic::{AtomicU64, Ordering};

use strata_primitives::{BlockNumber, Hash};

/// Something the import pipeline did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    BlockProcessed {
        number: BlockNumber,
        hash: Hash,
        txs: usize,
        gas_used: u64,
    },
    BlockImported {
        number: BlockNumber,
        hash: Hash,
    },
    BlockRejected {
        number: BlockNumber,
        hash: Hash,
        reason: String,
    },
    KnownBlockSkipped {
        number: BlockNumber,
        hash: Hash,
    },
    FinalizeFailed {
        number: BlockNumber,
        reason: String,
    },
}

pub trait ImportObserver: Send + Sync {
    fn record(&self, event: &ImportEvent);
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ImportObserver for NoopObserver {
    fn record(&self, _event: &ImportEvent) {}
}

/// Counts events by kind.
#[derive(Debug, Default)]
pub struct CountingObserver {
    processed: AtomicU64,
    imported: AtomicU64,
    rejected: AtomicU64,
    known: AtomicU64,
    finalize_failed: AtomicU64,
    gas_processed: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn imported(&self) -> u64 {
        self.imported.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn known(&self) -> u64 {
        self.known.load(Ordering::Relaxed)
    }

    pub fn finalize_failed(&self) -> u64 {
        self.finalize_failed.load(Ordering::Relaxed)
    }

    /// Total gas used by processed blocks.
    pub fn gas_processed(&self) -> u64 {
        self.gas_processed.load(Ordering::Relaxed)
    }
}

impl ImportObserver for CountingObserver {
    fn record(&self, event: &ImportEvent) {
        let counter = match event {
            ImportEvent::BlockProcessed { gas_used, .. } => {
                self.gas_processed.fetch_add(*gas_used, Ordering::Relaxed);
                &self.processed
            }
            ImportEvent::BlockImported { .. } => &self.imported,
            ImportEvent::BlockRejected { .. } => &self.rejected,
            ImportEvent::KnownBlockSkipped { .. } => &self.known,
            ImportEvent::FinalizeFailed { .. } => &self.finalize_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
