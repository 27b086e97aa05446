//! Core data structures for one recalculation pass

use crate::pda::types::{StakerKind, StakerSubtype, Wallet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One staked custodian node, grouped under its service domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodianNode {
    pub domain: String,
    pub staked_amount: f64,
    pub wallet_address: String,
}

/// One staked non-custodian node, grouped under its output wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonCustodianNode {
    pub wallet_address: String,
    pub staked_amount: f64,
}

/// Snapshot of staked nodes, rebuilt every run
///
/// Maps keep insertion order so reconciliation walks domains and wallets in
/// the order the retriever produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakedNodeAggregate {
    pub custodian: IndexMap<String, Vec<CustodianNode>>,
    pub non_custodian: IndexMap<String, Vec<NonCustodianNode>>,
}

impl StakedNodeAggregate {
    pub fn push_custodian(&mut self, node: CustodianNode) {
        self.custodian.entry(node.domain.clone()).or_default().push(node);
    }

    pub fn push_non_custodian(&mut self, node: NonCustodianNode) {
        self.non_custodian
            .entry(node.wallet_address.clone())
            .or_default()
            .push(node);
    }

    pub fn node_count(&self) -> usize {
        self.custodian.values().map(Vec::len).sum::<usize>()
            + self.non_custodian.values().map(Vec::len).sum::<usize>()
    }
}

/// Issue a new credential
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddSpec {
    pub point: i64,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<StakerKind>,
    pub pda_sub_type: StakerSubtype,
    pub owner: String,
    #[serde(rename = "serviceDomain", skip_serializing_if = "Option::is_none")]
    pub service_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallets: Option<Vec<Wallet>>,
}

/// Change the point (and optionally wallets) of an issued credential
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateSpec {
    pub pda_id: String,
    pub point: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallets: Option<Vec<Wallet>>,
}

/// A pending write against the credential API
///
/// Reconcilers emit these directly; the queue only moves them around.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload", rename_all = "lowercase")]
pub enum Job {
    Add(AddSpec),
    Update(UpdateSpec),
}

impl Job {
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Receiver of reconciliation output
pub trait JobSink {
    fn emit(&mut self, job: Job);
}

impl JobSink for Vec<Job> {
    fn emit(&mut self, job: Job) {
        self.push(job);
    }
}

/// The credential API only accepts whole points; sums stay fractional until here.
pub fn to_point(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}
