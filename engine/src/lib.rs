//! `strata-engine`: block import core.
//!
//! Takes candidate blocks from the network and decides whether they extend
//! the local chain:
//!
//! `block → validate_body → (headers verified concurrently) → process → validate_state → write`
//!
//! ## Architecture
//!
//! - [`consensus`]: the [`ConsensusEngine`] capability with the Clique
//!   proof-of-authority engine and a scriptable fake
//! - [`verifier::HeaderVerifier`]: worker pool checking header batches,
//!   results in submission order, abortable
//! - [`processor::StateProcessor`]: applies transactions, builds receipts and
//!   logs, runs engine finalisation
//! - [`validator::BlockValidator`]: body checks before processing, header
//!   commitments after
//! - [`gas_limit`]: the gas limit adjustment policy and header bound check
//! - [`import::BlockImporter`]: wires the above into `insert_chain`
//! - [`chain`], [`state`], [`executor`]: capabilities the core runs against,
//!   with in-memory implementations

pub mod chain;
pub mod consensus;
pub mod error;
pub mod executor;
pub mod gas_limit;
pub mod genesis;
pub mod import;
pub mod observer;
pub mod processor;
pub mod state;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validator;
pub mod verifier;

// Re-export key types for convenience
pub use chain::{ChainReader, MemoryChain};
pub use consensus::{Clique, ConsensusEngine, Engine, FakeEngine, FakeMode};
pub use error::{ConsensusError, ExecError, ImportError, ProcessError, ValidationError};
pub use executor::{TransactionExecutor, TransferExecutor};
pub use gas_limit::calc_gas_limit;
pub use genesis::Genesis;
pub use import::BlockImporter;
pub use observer::{CountingObserver, ImportEvent, ImportObserver, NoopObserver};
pub use processor::{ProcessOutput, StateProcessor};
pub use state::{MemoryState, StateBackend};
pub use validator::BlockValidator;
pub use verifier::{AbortHandle, HeaderVerifier, VerificationResults};
