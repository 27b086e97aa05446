//! Liquidity Provider reconciliation
//!
//! Matched by operator (gateway id) only. Existing Liquidity Provider
//! credentials follow the current score up or down; operators with a positive
//! score and no credential get one. There is no zeroing sweep.

use super::collaborators::CredentialDirectory;
use super::types::{to_point, AddSpec, Job, JobSink, UpdateSpec};
use crate::error::Result;
use crate::pda::types::{IssuedCredential, StakerSubtype};
use indexmap::{IndexMap, IndexSet};

/// EVM wallets of every distinct credential owner, one lookup per owner.
pub async fn collect_operator_wallets(
    credentials: &[IssuedCredential],
    directory: &dyn CredentialDirectory,
) -> Result<IndexMap<String, Vec<String>>> {
    let mut operator_wallets: IndexMap<String, Vec<String>> = IndexMap::new();

    for credential in credentials {
        let gateway_id = credential.owner_gateway_id();
        if operator_wallets.contains_key(gateway_id) {
            continue;
        }
        let wallets = directory.operator_wallets(gateway_id).await?;
        operator_wallets.insert(gateway_id.to_string(), wallets);
    }

    log::info!("👛 Collected wallets for {} operators", operator_wallets.len());
    Ok(operator_wallets)
}

pub fn reconcile_liquidity(
    credentials: &[IssuedCredential],
    operator_liquidity: &IndexMap<String, f64>,
    image: &str,
    sink: &mut impl JobSink,
) {
    log::info!("🔎 Liquidity pass: {} operators", operator_liquidity.len());

    let mut covered: IndexSet<&str> = IndexSet::new();

    for credential in credentials {
        let Some(claim) = credential.staker_claim() else {
            continue;
        };
        if claim.pda_subtype != StakerSubtype::LiquidityProvider {
            continue;
        }

        let gateway_id = credential.owner_gateway_id();
        let point = to_point(operator_liquidity.get(gateway_id).copied().unwrap_or(0.0));

        if claim.point != point as f64 {
            sink.emit(Job::Update(UpdateSpec {
                pda_id: credential.id.clone(),
                point,
                wallets: None,
            }));
        }

        covered.insert(gateway_id);
    }

    for (gateway_id, liquidity) in operator_liquidity {
        if *liquidity > 0.0 && !covered.contains(gateway_id.as_str()) {
            sink.emit(Job::Add(AddSpec {
                point: to_point(*liquidity),
                image: image.to_string(),
                node_type: None,
                pda_sub_type: StakerSubtype::LiquidityProvider,
                owner: gateway_id.clone(),
                service_domain: None,
                wallets: None,
            }));
        }
    }

    log::info!("✅ Liquidity pass complete");
}
