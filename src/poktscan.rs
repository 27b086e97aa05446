//! POKTscan staked node retrieval
//!
//! Walks `ListPoktNode` with its cursor until `has_next` is false, then groups
//! the nodes: custodial nodes by service domain, the rest by output wallet.

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::graphql::GraphQlClient;
use crate::pipeline::collaborators::StakedNodeSource;
use crate::pipeline::types::{CustodianNode, NonCustodianNode, StakedNodeAggregate};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Node tokens are reported in uPOKT
const UPOKT_PER_POKT: f64 = 1_000_000.0;

const LIST_POKT_NODE_GQL: &str = r#"
    query ListPoktNode($cursor: ID) {
        ListPoktNode(
            pagination: {
                cursor: $cursor
                limit: 1500
                sort: { property: "_id", direction: -1 }
                filter: {
                    operator: AND
                    properties: [
                        { property: "status", operator: EQ, type: INT, value: "2" }
                    ]
                }
            }
        ) {
            items {
                output_address
                service_domain
                custodial
                tokens
            }
            pageInfo {
                has_next
                next
            }
        }
    }"#;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeItem {
    pub output_address: String,
    #[serde(default)]
    pub service_domain: Option<String>,
    #[serde(default)]
    pub custodial: bool,
    pub tokens: f64,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    has_next: bool,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodePage {
    items: Vec<NodeItem>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(rename = "ListPoktNode")]
    list_pokt_node: NodePage,
}

/// Group raw node items into the per-domain / per-wallet aggregate.
///
/// A custodial node without a service domain cannot be attributed to an
/// operator and is dropped.
pub fn group_nodes(items: Vec<NodeItem>) -> StakedNodeAggregate {
    let mut aggregate = StakedNodeAggregate::default();

    for item in items {
        let staked_amount = item.tokens / UPOKT_PER_POKT;

        if item.custodial {
            match item.service_domain.filter(|d| !d.is_empty()) {
                Some(domain) => aggregate.push_custodian(CustodianNode {
                    domain,
                    staked_amount,
                    wallet_address: item.output_address,
                }),
                None => {
                    log::debug!(
                        "⚠️  Custodial node {} has no service domain",
                        item.output_address
                    );
                }
            }
        } else {
            aggregate.push_non_custodian(NonCustodianNode {
                wallet_address: item.output_address,
                staked_amount,
            });
        }
    }

    aggregate
}

pub struct PoktScanRetriever {
    graphql: GraphQlClient,
}

impl PoktScanRetriever {
    pub fn new(graphql: GraphQlClient) -> Self {
        Self { graphql }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let graphql = GraphQlClient::new(
            "POKTscan",
            &config.poktscan_api_url,
            &[("authorization", config.poktscan_api_token.clone())],
            config.http_timeout,
        )?;
        Ok(Self::new(graphql))
    }

    async fn list_nodes(&self) -> Result<Vec<NodeItem>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let data: ListData = self
                .graphql
                .request(LIST_POKT_NODE_GQL, json!({ "cursor": cursor }))
                .await?;
            let page = data.list_pokt_node;
            pages += 1;

            items.extend(page.items);

            match (page.page_info.has_next, page.page_info.next) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        log::debug!("   └─ {} nodes across {} pages", items.len(), pages);
        Ok(items)
    }
}

#[async_trait]
impl StakedNodeSource for PoktScanRetriever {
    async fn retrieve(&self) -> Result<StakedNodeAggregate> {
        let items = self.list_nodes().await?;
        Ok(group_nodes(items))
    }
}
