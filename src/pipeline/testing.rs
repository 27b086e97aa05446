//! In-memory collaborators and credential builders for unit tests

use super::collaborators::{
    CredentialDirectory, CredentialWriter, LiquidityValuator, OperatorResolver, StakedNodeSource,
};
use super::types::{AddSpec, Job, StakedNodeAggregate, UpdateSpec};
use crate::error::{Error, Result};
use crate::pda::types::{
    BadgeClaim, Claim, DataAsset, IssuedCredential, Owner, PdaStatus, PdaType, StakerClaim,
    StakerKind, StakerSubtype, Wallet,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn credential(id: &str, gateway_id: &str, claim: Claim) -> IssuedCredential {
    IssuedCredential {
        id: id.to_string(),
        status: PdaStatus::Valid,
        data_asset: DataAsset {
            claim,
            owner: Owner {
                gateway_id: gateway_id.to_string(),
            },
        },
    }
}

pub fn custodian_validator(id: &str, domain: &str, gateway_id: &str) -> IssuedCredential {
    credential(
        id,
        gateway_id,
        Claim::Staker(StakerClaim {
            pda_subtype: StakerSubtype::Validator,
            kind: Some(StakerKind::Custodian),
            service_domain: Some(domain.to_string()),
            wallets: vec![Wallet {
                address: "address".to_string(),
                amount: 1.0,
            }],
            point: 10.0,
        }),
    )
}

pub fn non_custodian_validator(id: &str, wallet: &str) -> IssuedCredential {
    credential(
        id,
        "owner_gateway",
        Claim::Staker(StakerClaim {
            pda_subtype: StakerSubtype::Validator,
            kind: Some(StakerKind::NonCustodian),
            service_domain: None,
            wallets: vec![Wallet {
                address: wallet.to_string(),
                amount: 1.0,
            }],
            point: 10.0,
        }),
    )
}

pub fn liquidity_provider(id: &str, gateway_id: &str, point: f64) -> IssuedCredential {
    credential(
        id,
        gateway_id,
        Claim::Staker(StakerClaim {
            pda_subtype: StakerSubtype::LiquidityProvider,
            kind: None,
            service_domain: None,
            wallets: vec![],
            point,
        }),
    )
}

pub fn citizen(id: &str, gateway_id: &str) -> IssuedCredential {
    credential(
        id,
        gateway_id,
        Claim::Citizen(BadgeClaim {
            pda_subtype: "POKT DNA".to_string(),
            point: 1.0,
        }),
    )
}

/// Resolver backed by a fixed domain → gateway id table
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(domain, id)| (domain.to_string(), id.to_string()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorResolver for StaticResolver {
    async fn resolve_operator_id(&self, domain: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table.get(domain).cloned()
    }
}

/// Node source returning a fixed snapshot, or failing when `None`
pub struct FixedNodeSource(pub Option<StakedNodeAggregate>);

#[async_trait]
impl StakedNodeSource for FixedNodeSource {
    async fn retrieve(&self) -> Result<StakedNodeAggregate> {
        self.0
            .clone()
            .ok_or_else(|| Error::UnexpectedResponse("node source unavailable".to_string()))
    }
}

#[derive(Default)]
pub struct FixedDirectory {
    pub credentials: Vec<IssuedCredential>,
    pub wallets: HashMap<String, Vec<String>>,
    pub wallet_lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl CredentialDirectory for FixedDirectory {
    async fn list_valid_credentials(&self, kinds: &[PdaType]) -> Result<Vec<IssuedCredential>> {
        Ok(self
            .credentials
            .iter()
            .filter(|c| c.is_valid() && kinds.contains(&c.claim().pda_type()))
            .cloned()
            .collect())
    }

    async fn operator_wallets(&self, gateway_id: &str) -> Result<Vec<String>> {
        self.wallet_lookups
            .lock()
            .unwrap()
            .push(gateway_id.to_string());
        Ok(self.wallets.get(gateway_id).cloned().unwrap_or_default())
    }
}

/// Valuator that reports a fixed score per operator (0 when unknown)
#[derive(Default)]
pub struct FixedValuator(pub HashMap<String, f64>);

#[async_trait]
impl LiquidityValuator for FixedValuator {
    async fn valuate_operators(
        &self,
        operator_wallets: &IndexMap<String, Vec<String>>,
    ) -> Result<IndexMap<String, f64>> {
        Ok(operator_wallets
            .keys()
            .map(|id| (id.clone(), self.0.get(id).copied().unwrap_or(0.0)))
            .collect())
    }
}

/// Writer that records every call and tracks write concurrency
#[derive(Default)]
pub struct RecordingWriter {
    delay: Option<Duration>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    jobs: Mutex<Vec<Job>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    issued: AtomicUsize,
    updated: AtomicUsize,
}

impl RecordingWriter {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Fail every job whose pda id or owner equals `key`
    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_on: Some(key.to_string()),
            ..Default::default()
        }
    }

    /// Panic on the job whose pda id or owner equals `key`, taking the
    /// listener task down with it
    pub fn panicking_on(key: &str) -> Self {
        Self {
            panic_on: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn updated(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }

    async fn record(&self, job: Job, key: &str) -> Result<String> {
        self.jobs.lock().unwrap().push(job);
        if self.panic_on.as_deref() == Some(key) {
            panic!("writer crashed on {}", key);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.as_deref() == Some(key) {
            return Err(Error::GraphQl(format!("rejected {}", key)));
        }
        Ok(format!("id_{}", key))
    }
}

#[async_trait]
impl CredentialWriter for RecordingWriter {
    async fn issue(&self, spec: &AddSpec) -> Result<String> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        self.record(Job::Add(spec.clone()), &spec.owner).await
    }

    async fn update(&self, spec: &UpdateSpec) -> Result<String> {
        self.updated.fetch_add(1, Ordering::SeqCst);
        self.record(Job::Update(spec.clone()), &spec.pda_id).await
    }
}
