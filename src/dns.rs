//! Operator identity from DNS
//!
//! A node operator proves ownership of a service domain by publishing a TXT
//! record `GATEWAY_ID=<gateway id>` on it.

use crate::pipeline::collaborators::OperatorResolver;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

const GATEWAY_ID_IDENTIFIER: &str = "GATEWAY_ID";

/// First `GATEWAY_ID=<value>` among the flattened TXT strings.
pub fn gateway_id_from_txt(records: &[String]) -> Option<String> {
    records.iter().find_map(|record| {
        let mut parts = record.split('=');
        match (parts.next(), parts.next()) {
            (Some(GATEWAY_ID_IDENTIFIER), Some(value)) if !value.is_empty() => {
                Some(value.to_string())
            }
            _ => None,
        }
    })
}

pub struct TxtRecordResolver {
    resolver: TokioAsyncResolver,
}

impl TxtRecordResolver {
    /// Uses the host's resolv.conf, or public defaults when it cannot be read.
    pub fn from_system() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                log::warn!("⚠️  System DNS config unavailable ({}), using defaults", e);
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { resolver }
    }

    async fn txt_records(&self, domain: &str) -> Option<Vec<String>> {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => Some(
                lookup
                    .iter()
                    .flat_map(|txt| txt.txt_data().iter())
                    .map(|data| String::from_utf8_lossy(data).into_owned())
                    .collect(),
            ),
            Err(e) => {
                log::debug!("⚠️  TXT lookup failed for {}: {}", domain, e);
                None
            }
        }
    }
}

#[async_trait]
impl OperatorResolver for TxtRecordResolver {
    async fn resolve_operator_id(&self, domain: &str) -> Option<String> {
        let records = self.txt_records(domain).await?;
        let gateway_id = gateway_id_from_txt(&records);
        if gateway_id.is_none() {
            log::debug!("   └─ {} has no {} record", domain, GATEWAY_ID_IDENTIFIER);
        }
        gateway_id
    }
}
