//! Validator reconciliation: staked nodes vs. issued Validator credentials
//!
//! Two passes with the same shape:
//!
//! - custodian: keyed by service domain, owner resolved through DNS; matched on
//!   `(serviceDomain, gatewayId, Validator, custodian)`
//! - non-custodian: keyed by output wallet; matched on the credential's first
//!   wallet address with `(Validator, non-custodian)`
//!
//! A match becomes an update with the current rounded stake, no match becomes
//! an add. Afterwards every Validator credential of the pass's kind that no
//! longer has a matching key in the snapshot is zeroed (point 0, no wallets).
//! Credentials are never deleted.

use super::collaborators::OperatorResolver;
use super::types::{to_point, AddSpec, Job, JobSink, StakedNodeAggregate, UpdateSpec};
use crate::pda::types::{IssuedCredential, StakerKind, StakerSubtype, Wallet};
use std::collections::HashMap;

fn zero_point(credential: &IssuedCredential) -> Job {
    Job::Update(UpdateSpec {
        pda_id: credential.id.clone(),
        point: 0,
        wallets: Some(Vec::new()),
    })
}

fn find_custodian_validator<'a>(
    credentials: &'a [IssuedCredential],
    domain: &str,
    gateway_id: &str,
) -> Option<&'a IssuedCredential> {
    credentials.iter().find(|credential| {
        credential.owner_gateway_id() == gateway_id
            && credential.staker_claim().is_some_and(|claim| {
                claim.is_validator(StakerKind::Custodian)
                    && claim.service_domain.as_deref() == Some(domain)
            })
    })
}

fn find_non_custodian_validator<'a>(
    credentials: &'a [IssuedCredential],
    wallet_address: &str,
) -> Option<&'a IssuedCredential> {
    credentials.iter().find(|credential| {
        credential.staker_claim().is_some_and(|claim| {
            claim.is_validator(StakerKind::NonCustodian)
                && claim.first_wallet() == Some(wallet_address)
        })
    })
}

/// Custodian pass followed by its zeroing sweep.
///
/// Each domain is resolved once; domains that do not resolve are skipped and
/// count as absent for the sweep.
pub async fn reconcile_custodians(
    aggregate: &StakedNodeAggregate,
    credentials: &[IssuedCredential],
    resolver: &dyn OperatorResolver,
    image: &str,
    sink: &mut impl JobSink,
) {
    log::info!("🔎 Custodian pass: {} domains", aggregate.custodian.len());

    let mut resolved: HashMap<&str, Option<String>> =
        HashMap::with_capacity(aggregate.custodian.len());

    for (domain, nodes) in &aggregate.custodian {
        let gateway_id = resolver.resolve_operator_id(domain).await;
        resolved.insert(domain.as_str(), gateway_id.clone());

        let Some(gateway_id) = gateway_id else {
            log::debug!("   ├─ {} has no GATEWAY_ID record, skipped", domain);
            continue;
        };

        let total: f64 = nodes.iter().map(|node| node.staked_amount).sum();
        let wallets: Vec<Wallet> = nodes
            .iter()
            .map(|node| Wallet {
                address: node.wallet_address.clone(),
                amount: node.staked_amount,
            })
            .collect();

        match find_custodian_validator(credentials, domain, &gateway_id) {
            Some(existing) => sink.emit(Job::Update(UpdateSpec {
                pda_id: existing.id.clone(),
                point: to_point(total),
                wallets: Some(wallets),
            })),
            None => sink.emit(Job::Add(AddSpec {
                point: to_point(total),
                image: image.to_string(),
                node_type: Some(StakerKind::Custodian),
                pda_sub_type: StakerSubtype::Validator,
                owner: gateway_id,
                service_domain: Some(domain.clone()),
                wallets: Some(wallets),
            })),
        }
    }

    for credential in credentials {
        let Some(claim) = credential.staker_claim() else {
            continue;
        };
        if !claim.is_validator(StakerKind::Custodian) {
            continue;
        }

        let still_staked = claim
            .service_domain
            .as_deref()
            .and_then(|domain| resolved.get(domain))
            .is_some_and(|gateway_id| gateway_id.as_deref() == Some(credential.owner_gateway_id()));

        if !still_staked {
            log::debug!("   ├─ {} no longer staked, zeroing", credential.id);
            sink.emit(zero_point(credential));
        }
    }

    log::info!("✅ Custodian pass complete");
}

/// Non-custodian pass followed by its zeroing sweep.
pub fn reconcile_non_custodians(
    aggregate: &StakedNodeAggregate,
    credentials: &[IssuedCredential],
    image: &str,
    sink: &mut impl JobSink,
) {
    log::info!("🔎 Non-custodian pass: {} wallets", aggregate.non_custodian.len());

    for (wallet_address, nodes) in &aggregate.non_custodian {
        let total: f64 = nodes.iter().map(|node| node.staked_amount).sum();
        let wallets = vec![Wallet {
            address: wallet_address.clone(),
            amount: total,
        }];

        match find_non_custodian_validator(credentials, wallet_address) {
            Some(existing) => sink.emit(Job::Update(UpdateSpec {
                pda_id: existing.id.clone(),
                point: to_point(total),
                wallets: Some(wallets),
            })),
            None => sink.emit(Job::Add(AddSpec {
                point: to_point(total),
                image: image.to_string(),
                node_type: Some(StakerKind::NonCustodian),
                pda_sub_type: StakerSubtype::Validator,
                owner: wallet_address.clone(),
                service_domain: None,
                wallets: Some(wallets),
            })),
        }
    }

    for credential in credentials {
        let Some(claim) = credential.staker_claim() else {
            continue;
        };
        if !claim.is_validator(StakerKind::NonCustodian) {
            continue;
        }

        let still_staked = claim
            .first_wallet()
            .is_some_and(|wallet| aggregate.non_custodian.contains_key(wallet));

        if !still_staked {
            log::debug!("   ├─ {} no longer staked, zeroing", credential.id);
            sink.emit(zero_point(credential));
        }
    }

    log::info!("✅ Non-custodian pass complete");
}

/// Both Validator passes over one snapshot.
pub async fn reconcile_validators(
    aggregate: &StakedNodeAggregate,
    credentials: &[IssuedCredential],
    resolver: &dyn OperatorResolver,
    image: &str,
    sink: &mut impl JobSink,
) {
    reconcile_custodians(aggregate, credentials, resolver, image, sink).await;
    reconcile_non_custodians(aggregate, credentials, image, sink);
}
