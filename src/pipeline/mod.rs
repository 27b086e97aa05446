//! # Recalculation Pipeline
//!
//! Brings issued credentials in line with on-chain stake and liquidity.
//!
//! ## Flow
//!
//! 1. Snapshot staked nodes and valid credentials
//! 2. Reconcile Validator credentials (custodian by domain, non-custodian by wallet)
//! 3. Reconcile Liquidity Provider credentials (by operator)
//! 4. Every decision becomes a [`Job`] on a FIFO [`JobQueue`]
//! 5. A throttled listener drains the queue into the credential API
//!
//! ## Module Organization
//!
//! - `types` - Node aggregate, add/update specs, jobs
//! - `queue` - FIFO/LIFO job queue with drain wait
//! - `collaborators` - Traits for DNS, node source, credential API, liquidity
//! - `listener` - Bounded-concurrency write loop
//! - `stake` - Validator reconciliation
//! - `liquidity` - Liquidity Provider reconciliation
//! - `orchestrator` - One full run
//! - `scheduler` - Daily trigger

pub mod collaborators;
pub mod listener;
pub mod liquidity;
pub mod orchestrator;
pub mod queue;
pub mod scheduler;
pub mod stake;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborators::{
    CredentialDirectory, CredentialWriter, LiquidityValuator, OperatorResolver, StakedNodeSource,
};
pub use listener::{start_job_listener, ListenerHandle, ListenerStats};
pub use orchestrator::{Collaborators, Orchestrator, RunReport, RunSettings, RunState};
pub use queue::{Discipline, Drained, JobQueue};
pub use types::{AddSpec, Job, JobSink, StakedNodeAggregate, UpdateSpec};
