//! Contracts for everything the recalculation core talks to
//!
//! Concrete implementations live in `dns`, `poktscan`, `pda` and `wpokt`.
//! Tests substitute in-memory fakes.

use super::types::{AddSpec, StakedNodeAggregate, UpdateSpec};
use crate::error::Result;
use crate::pda::types::{IssuedCredential, PdaType};
use async_trait::async_trait;
use indexmap::IndexMap;

/// Maps a service domain to the gateway id that operates it
///
/// Fails closed: any lookup problem is reported as `None`, never as an error.
#[async_trait]
pub trait OperatorResolver: Send + Sync {
    async fn resolve_operator_id(&self, domain: &str) -> Option<String>;
}

/// Produces one complete snapshot of staked nodes (pagination is internal)
#[async_trait]
pub trait StakedNodeSource: Send + Sync {
    async fn retrieve(&self) -> Result<StakedNodeAggregate>;
}

/// Read side of the credential API
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Valid credentials whose `pdaType` is one of `kinds`
    async fn list_valid_credentials(&self, kinds: &[PdaType]) -> Result<Vec<IssuedCredential>>;

    /// EVM wallet addresses linked to a gateway id
    async fn operator_wallets(&self, gateway_id: &str) -> Result<Vec<String>>;
}

/// Values the liquidity each operator provides across its wallets
#[async_trait]
pub trait LiquidityValuator: Send + Sync {
    async fn valuate_operators(
        &self,
        operator_wallets: &IndexMap<String, Vec<String>>,
    ) -> Result<IndexMap<String, f64>>;
}

/// Write side of the credential API. Both calls return the credential id.
#[async_trait]
pub trait CredentialWriter: Send + Sync {
    async fn issue(&self, spec: &AddSpec) -> Result<String>;

    async fn update(&self, spec: &UpdateSpec) -> Result<String>;
}
