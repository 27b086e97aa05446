//! One recalculation pass, start to finish
//!
//! Idle → QueueReset → ListenerStarted → StakeReconciled →
//! LiquidityReconciled → Drained → ListenerStopped → Idle
//!
//! Any error aborts the run: the listener is abandoned and the error is
//! returned to the trigger. Whatever was already written stays written; the
//! next run recomputes everything from a fresh snapshot.

use super::collaborators::{
    CredentialDirectory, CredentialWriter, LiquidityValuator, OperatorResolver, StakedNodeSource,
};
use super::listener::{start_job_listener, ListenerStats};
use super::liquidity::{collect_operator_wallets, reconcile_liquidity};
use super::queue::{Discipline, JobQueue};
use super::stake::reconcile_validators;
use super::types::{Job, JobSink};
use crate::config::PipelineConfig;
use crate::error::{error_chain, Result};
use crate::pda::types::{IssuedCredential, PdaType};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    QueueReset,
    ListenerStarted,
    StakeReconciled,
    LiquidityReconciled,
    Drained,
    ListenerStopped,
}

/// Everything a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn OperatorResolver>,
    pub nodes: Arc<dyn StakedNodeSource>,
    pub directory: Arc<dyn CredentialDirectory>,
    pub valuator: Arc<dyn LiquidityValuator>,
    pub writer: Arc<dyn CredentialWriter>,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub supply_image: String,
    pub liquidity_image: String,
    pub listener_latency: Duration,
    pub listener_batch_size: usize,
    pub wait_interval: Duration,
}

impl RunSettings {
    pub fn new(pipeline: &PipelineConfig, supply_image: String, liquidity_image: String) -> Self {
        Self {
            supply_image,
            liquidity_image,
            listener_latency: Duration::from_millis(pipeline.listener_latency_ms),
            listener_batch_size: pipeline.listener_batch_size,
            wait_interval: Duration::from_millis(pipeline.queue_wait_interval_ms),
        }
    }
}

/// Job counts for one completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub added: usize,
    pub updated: usize,
    pub writes: ListenerStats,
}

/// Enqueues reconciliation output and counts it
struct CountingSink<'q> {
    queue: &'q JobQueue<Job>,
    added: usize,
    updated: usize,
}

impl JobSink for CountingSink<'_> {
    fn emit(&mut self, job: Job) {
        match &job {
            Job::Add(_) => self.added += 1,
            Job::Update(_) => self.updated += 1,
        }
        self.queue.add_job(job);
    }
}

pub struct Orchestrator {
    collaborators: Collaborators,
    settings: RunSettings,
    queue: Arc<JobQueue<Job>>,
    running: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: RunSettings) -> Self {
        Self {
            collaborators,
            settings,
            queue: Arc::new(JobQueue::new("PDAQueue", Discipline::Fifo)),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &JobQueue<Job> {
        &self.queue
    }

    fn enter(state: RunState) {
        log::info!("   ├─ {:?}", state);
    }

    /// Run one full pass. Concurrent calls are serialized; the queue belongs
    /// to one run at a time.
    pub async fn run(&self) -> Result<RunReport> {
        let _running = self.running.lock().await;

        log::info!("🚀 Started recalculation");

        self.queue.reset();
        Self::enter(RunState::QueueReset);

        let listener = start_job_listener(
            self.queue.clone(),
            self.collaborators.writer.clone(),
            self.settings.listener_latency,
            self.settings.listener_batch_size,
        );
        Self::enter(RunState::ListenerStarted);

        let mut sink = CountingSink {
            queue: &self.queue,
            added: 0,
            updated: 0,
        };

        if let Err(e) = self.reconcile(&mut sink).await {
            log::error!("❌ Recalculation aborted: {}", error_chain(&e));
            listener.abandon().await;
            Self::enter(RunState::Idle);
            return Err(e);
        }

        let drained = match listener.wait_drained(self.settings.wait_interval).await {
            Ok(drained) => drained,
            Err(e) => {
                log::error!("❌ Recalculation aborted: {}", error_chain(&e));
                listener.abandon().await;
                Self::enter(RunState::Idle);
                return Err(e);
            }
        };
        Self::enter(RunState::Drained);

        let writes = listener.stop(drained).await;
        Self::enter(RunState::ListenerStopped);

        let report = RunReport {
            added: sink.added,
            updated: sink.updated,
            writes,
        };

        log::info!(
            "✅ Completed recalculation: {} adds, {} updates ({} written, {} failed)",
            report.added,
            report.updated,
            report.writes.succeeded,
            report.writes.failed
        );
        Self::enter(RunState::Idle);

        Ok(report)
    }

    async fn reconcile(&self, sink: &mut CountingSink<'_>) -> Result<()> {
        let credentials = self
            .collaborators
            .directory
            .list_valid_credentials(&[PdaType::Citizen, PdaType::Staker])
            .await?;

        let stakers: Vec<IssuedCredential> = credentials
            .iter()
            .filter(|credential| credential.claim().pda_type() == PdaType::Staker)
            .cloned()
            .collect();

        log::info!(
            "📋 {} valid credentials ({} staker)",
            credentials.len(),
            stakers.len()
        );

        let aggregate = self.collaborators.nodes.retrieve().await?;
        log::info!(
            "📊 Staked nodes: {} ({} domains, {} wallets)",
            aggregate.node_count(),
            aggregate.custodian.len(),
            aggregate.non_custodian.len()
        );

        reconcile_validators(
            &aggregate,
            &stakers,
            self.collaborators.resolver.as_ref(),
            &self.settings.supply_image,
            sink,
        )
        .await;
        Self::enter(RunState::StakeReconciled);

        let operator_wallets =
            collect_operator_wallets(&credentials, self.collaborators.directory.as_ref()).await?;
        let operator_liquidity = self
            .collaborators
            .valuator
            .valuate_operators(&operator_wallets)
            .await?;

        reconcile_liquidity(
            &credentials,
            &operator_liquidity,
            &self.settings.liquidity_image,
            sink,
        );
        Self::enter(RunState::LiquidityReconciled);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::testing::{
        citizen, custodian_validator, liquidity_provider, non_custodian_validator, FixedDirectory,
        FixedNodeSource, FixedValuator, RecordingWriter, StaticResolver,
    };
    use crate::pipeline::types::{CustodianNode, NonCustodianNode, StakedNodeAggregate};
    use std::collections::HashMap;

    fn settings() -> RunSettings {
        RunSettings {
            supply_image: "supply.png".to_string(),
            liquidity_image: "liquidity.png".to_string(),
            listener_latency: Duration::from_millis(10),
            listener_batch_size: 2,
            wait_interval: Duration::from_millis(5),
        }
    }

    fn orchestrator(
        aggregate: Option<StakedNodeAggregate>,
        directory: FixedDirectory,
        liquidity: &[(&str, f64)],
        writer: Arc<RecordingWriter>,
    ) -> Orchestrator {
        Orchestrator::new(
            Collaborators {
                resolver: Arc::new(StaticResolver::new(&[("example.com", "gw1")])),
                nodes: Arc::new(FixedNodeSource(aggregate)),
                directory: Arc::new(directory),
                valuator: Arc::new(FixedValuator(
                    liquidity.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
                )),
                writer,
            },
            settings(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_every_job_through_writer() {
        let mut aggregate = StakedNodeAggregate::default();
        aggregate.push_custodian(CustodianNode {
            domain: "example.com".to_string(),
            staked_amount: 1000.0,
            wallet_address: "w1".to_string(),
        });
        aggregate.push_non_custodian(NonCustodianNode {
            wallet_address: "wallet1".to_string(),
            staked_amount: 20.0,
        });

        let directory = FixedDirectory {
            credentials: vec![
                custodian_validator("pda_gone", "gone.com", "gw9"),
                non_custodian_validator("pda_nc", "wallet1"),
                liquidity_provider("pda_lp", "gw2", 4.0),
                citizen("c1", "gw3"),
            ],
            wallets: HashMap::from([("gw3".to_string(), vec!["0xabc".to_string()])]),
            ..Default::default()
        };
        let writer = Arc::new(RecordingWriter::default());
        let orchestrator = orchestrator(
            Some(aggregate),
            directory,
            &[("gw2", 4.0), ("gw3", 7.0)],
            writer.clone(),
        );

        let report = orchestrator.run().await.unwrap();

        // add example.com, zero pda_gone, update pda_nc, add gw3 liquidity
        assert_eq!(report.added, 2);
        assert_eq!(report.updated, 2);
        assert_eq!(report.writes.succeeded, 4);
        assert_eq!(writer.jobs().len(), 4);
        assert!(orchestrator.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_failure_aborts_before_any_write() {
        let directory = FixedDirectory {
            credentials: vec![custodian_validator("pda1", "example.com", "gw1")],
            ..Default::default()
        };
        let writer = Arc::new(RecordingWriter::default());
        let orchestrator = orchestrator(None, directory, &[], writer.clone());

        assert!(orchestrator.run().await.is_err());
        assert!(writer.jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_writes_do_not_fail_the_run() {
        let mut aggregate = StakedNodeAggregate::default();
        aggregate.push_custodian(CustodianNode {
            domain: "example.com".to_string(),
            staked_amount: 5.0,
            wallet_address: "w1".to_string(),
        });
        let writer = Arc::new(RecordingWriter::failing_on("gw1"));
        let orchestrator =
            orchestrator(Some(aggregate), FixedDirectory::default(), &[], writer.clone());

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.writes.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_is_reset_between_runs() {
        let writer = Arc::new(RecordingWriter::default());
        let orchestrator = orchestrator(
            Some(StakedNodeAggregate::default()),
            FixedDirectory::default(),
            &[],
            writer.clone(),
        );
        orchestrator.queue().add_job(Job::Update(crate::pipeline::types::UpdateSpec {
            pda_id: "stale".to_string(),
            point: 1,
            wallets: None,
        }));

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report, RunReport::default());
        assert!(writer.jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_listener_fails_the_run() {
        let directory = FixedDirectory {
            credentials: vec![
                custodian_validator("pda1", "a.com", "gw1"),
                custodian_validator("pda2", "b.com", "gw2"),
                custodian_validator("pda3", "c.com", "gw3"),
            ],
            ..Default::default()
        };
        let writer = Arc::new(RecordingWriter::panicking_on("pda1"));
        let orchestrator = orchestrator(
            Some(StakedNodeAggregate::default()),
            directory,
            &[],
            writer.clone(),
        );

        let result = orchestrator.run().await;

        assert!(matches!(result, Err(Error::ListenerExited(_))));
    }
}
