//! MyGateway credential API: listing, wallet lookup, issue and update

use super::types::{IssuedCredential, PdaType, StakerKind};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::graphql::GraphQlClient;
use crate::pipeline::collaborators::{CredentialDirectory, CredentialWriter};
use crate::pipeline::types::{AddSpec, UpdateSpec};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const PAGE_SIZE: u64 = 100;

const ISSUED_PDAS_COUNT_GQL: &str = r#"
    query IssuedPDAsCount($org_gateway_id: String!) {
        issuedPDAsCount(
            filter: { organization: { type: GATEWAY_ID, value: $org_gateway_id } }
        )
    }"#;

const ISSUED_PDAS_GQL: &str = r#"
    query getPDAs($org_gateway_id: String!, $take: Float!, $skip: Float!) {
        issuedPDAs(
            filter: { organization: { type: GATEWAY_ID, value: $org_gateway_id } }
            take: $take
            skip: $skip
            order: { issuanceDate: "DESC" }
        ) {
            id
            status
            dataAsset {
                claim
                owner {
                    gatewayId
                }
            }
        }
    }"#;

const USER_AUTHENTICATIONS_GQL: &str = r#"
    query userAuthentications($user_GID: String!) {
        userAuthentications(user: { type: GATEWAY_ID, value: $user_GID }) {
            address
            chain
        }
    }"#;

const CREATE_PDA_GQL: &str = r#"
    mutation CreatePDA(
        $org_gateway_id: String!
        $data_model_id: String!
        $owner: String!
        $owner_type: UserIdentifierType!
        $image: String
        $claim: JSON!
    ) {
        createPDA(
            input: {
                dataModelId: $data_model_id
                title: "Pocket Network Staker"
                description: "Servicer or Validator Path"
                image: $image
                owner: { type: $owner_type, value: $owner }
                organization: { type: GATEWAY_ID, value: $org_gateway_id }
                claim: $claim
            }
        ) {
            id
        }
    }"#;

const UPDATE_PDA_GQL: &str = r#"
    mutation updatePDA($PDA_id: String!, $claim: JSON!) {
        updatePDA(input: { id: $PDA_id, claim: $claim }) {
            id
        }
    }"#;

/// One `{take, skip}` window over the issued credential list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub take: u64,
    pub skip: u64,
}

/// Split `max` items into pages of 100, the last one taking the remainder.
pub fn pagination(max: u64) -> Vec<Page> {
    if max <= PAGE_SIZE {
        return vec![Page { take: max, skip: 0 }];
    }

    (0..max.div_ceil(PAGE_SIZE))
        .map(|index| {
            let skip = index * PAGE_SIZE;
            Page {
                take: (max - skip).min(PAGE_SIZE),
                skip,
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CountData {
    #[serde(rename = "issuedPDAsCount")]
    issued_pdas_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PdasData {
    #[serde(rename = "issuedPDAs")]
    issued_pdas: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationsData {
    #[serde(rename = "userAuthentications")]
    user_authentications: Vec<Authentication>,
}

#[derive(Debug, Deserialize)]
struct Authentication {
    address: String,
    chain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(rename = "createPDA")]
    create_pda: Written,
}

#[derive(Debug, Deserialize)]
struct Updated {
    #[serde(rename = "updatePDA")]
    update_pda: Written,
}

#[derive(Debug, Deserialize)]
struct Written {
    id: String,
}

/// Identifier type of a new credential's owner
pub fn owner_type(node_type: Option<StakerKind>) -> &'static str {
    match node_type {
        Some(StakerKind::NonCustodian) => "POKT",
        _ => "GATEWAY_ID",
    }
}

/// Staker claim body for `createPDA`
pub fn issue_claim(spec: &AddSpec) -> Value {
    let mut claim = Map::new();
    claim.insert("pdaType".to_string(), json!("staker"));
    claim.insert("pdaSubtype".to_string(), json!(spec.pda_sub_type));
    if let Some(kind) = spec.node_type {
        claim.insert("type".to_string(), json!(kind));
    }
    claim.insert("point".to_string(), json!(spec.point));
    if spec.node_type == Some(StakerKind::Custodian) {
        if let Some(domain) = &spec.service_domain {
            claim.insert("serviceDomain".to_string(), json!(domain));
        }
    }
    claim.insert(
        "wallets".to_string(),
        json!(spec.wallets.clone().unwrap_or_default()),
    );
    Value::Object(claim)
}

/// Partial claim body for `updatePDA`
pub fn update_claim(spec: &UpdateSpec) -> Value {
    let mut claim = Map::new();
    claim.insert("point".to_string(), json!(spec.point));
    if let Some(wallets) = &spec.wallets {
        claim.insert("wallets".to_string(), json!(wallets));
    }
    Value::Object(claim)
}

/// Records that do not fit the credential model are skipped with a warning.
fn parse_credentials(records: Vec<Value>, kinds: &[PdaType]) -> Vec<IssuedCredential> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<IssuedCredential>(record.clone()) {
            Ok(credential) => Some(credential),
            Err(e) => {
                log::warn!("⚠️  Skipping unreadable credential: {} | record: {}", e, record);
                None
            }
        })
        .filter(|credential| {
            credential.is_valid() && kinds.contains(&credential.claim().pda_type())
        })
        .collect()
}

pub struct MyGatewayClient {
    graphql: GraphQlClient,
    org_gateway_id: String,
    data_model_id: String,
}

impl MyGatewayClient {
    pub fn new(graphql: GraphQlClient, org_gateway_id: String, data_model_id: String) -> Self {
        Self {
            graphql,
            org_gateway_id,
            data_model_id,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let graphql = GraphQlClient::new(
            "MyGateway",
            &config.mygateway_endpoint_url,
            &[
                ("authorization", format!("Bearer {}", config.mygateway_auth_token)),
                ("x-api-key", config.mygateway_api_key.clone()),
            ],
            config.http_timeout,
        )?;
        Ok(Self::new(
            graphql,
            config.org_gateway_id.clone(),
            config.staker_data_model_id.clone(),
        ))
    }

    async fn issued_count(&self) -> Result<u64> {
        let data: CountData = self
            .graphql
            .request(
                ISSUED_PDAS_COUNT_GQL,
                json!({ "org_gateway_id": self.org_gateway_id }),
            )
            .await?;

        data.issued_pdas_count.ok_or_else(|| {
            Error::UnexpectedResponse(format!(
                "organization {} has no issued credentials",
                self.org_gateway_id
            ))
        })
    }

    async fn fetch_page(&self, page: Page) -> Result<Vec<Value>> {
        let data: PdasData = self
            .graphql
            .request(
                ISSUED_PDAS_GQL,
                json!({
                    "org_gateway_id": self.org_gateway_id,
                    "take": page.take,
                    "skip": page.skip,
                }),
            )
            .await?;
        Ok(data.issued_pdas)
    }
}

#[async_trait]
impl CredentialDirectory for MyGatewayClient {
    async fn list_valid_credentials(&self, kinds: &[PdaType]) -> Result<Vec<IssuedCredential>> {
        let count = self.issued_count().await?;
        let pages = pagination(count);
        log::info!("📄 Fetching {} issued credentials in {} pages", count, pages.len());

        let responses = try_join_all(pages.into_iter().map(|page| self.fetch_page(page))).await?;
        let records: Vec<Value> = responses.into_iter().flatten().collect();

        Ok(parse_credentials(records, kinds))
    }

    async fn operator_wallets(&self, gateway_id: &str) -> Result<Vec<String>> {
        let data: AuthenticationsData = self
            .graphql
            .request(USER_AUTHENTICATIONS_GQL, json!({ "user_GID": gateway_id }))
            .await?;

        Ok(data
            .user_authentications
            .into_iter()
            .filter(|auth| auth.chain.as_deref() == Some("EVM"))
            .map(|auth| auth.address)
            .collect())
    }
}

#[async_trait]
impl CredentialWriter for MyGatewayClient {
    async fn issue(&self, spec: &AddSpec) -> Result<String> {
        let data: Created = self
            .graphql
            .request(
                CREATE_PDA_GQL,
                json!({
                    "org_gateway_id": self.org_gateway_id,
                    "data_model_id": self.data_model_id,
                    "owner": spec.owner,
                    "owner_type": owner_type(spec.node_type),
                    "image": spec.image,
                    "claim": issue_claim(spec),
                }),
            )
            .await?;
        Ok(data.create_pda.id)
    }

    async fn update(&self, spec: &UpdateSpec) -> Result<String> {
        let data: Updated = self
            .graphql
            .request(
                UPDATE_PDA_GQL,
                json!({ "PDA_id": spec.pda_id, "claim": update_claim(spec) }),
            )
            .await?;
        Ok(data.update_pda.id)
    }
}
