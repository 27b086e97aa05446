//! wPOKT liquidity valuation against the Uniswap V2 subgraph
//!
//! An operator's liquidity is the wPOKT it owns through LP tokens in the
//! configured pool, summed over its EVM wallets:
//! `liquidityTokenBalance / totalSupply * reserve(wPOKT side)`.

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::graphql::GraphQlClient;
use crate::pipeline::collaborators::LiquidityValuator;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

/// Operators per subgraph query
const OPERATOR_CHUNK: usize = 10;

const USERS_LIQUIDITY_GQL: &str = r#"
    query UsersLiquidity($Users_Wallet_Addr: [String!]!, $WPokt_ID: String!, $Pool_ID: String!) {
        positions: liquidityPositions(
            where: {
                pair: $Pool_ID
                pair_: { or: [{ token0: $WPokt_ID }, { token1: $WPokt_ID }] }
                user_in: $Users_Wallet_Addr
            }
        ) {
            user {
                id
            }
            liquidityTokenBalance
            pair {
                totalSupply
                token0 {
                    id
                }
                reserve0
                token1 {
                    id
                }
                reserve1
            }
        }
    }"#;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pair {
    #[serde(rename = "totalSupply")]
    pub total_supply: String,
    pub token0: TokenRef,
    pub reserve0: String,
    pub token1: TokenRef,
    pub reserve1: String,
}

/// Subgraph decimals arrive as strings
#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityPosition {
    pub user: UserRef,
    #[serde(rename = "liquidityTokenBalance")]
    pub liquidity_token_balance: String,
    pub pair: Pair,
}

#[derive(Debug, Deserialize)]
struct PositionsData {
    positions: Vec<LiquidityPosition>,
}

fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// wPOKT owned through one LP position, or `None` if the pair is unusable.
pub fn position_share(position: &LiquidityPosition, wpokt_token_id: &str) -> Option<f64> {
    let pair = &position.pair;
    let reserve = if pair.token0.id.eq_ignore_ascii_case(wpokt_token_id) {
        &pair.reserve0
    } else {
        &pair.reserve1
    };

    let balance = parse_decimal(&position.liquidity_token_balance)?;
    let total_supply = parse_decimal(&pair.total_supply).filter(|supply| *supply > 0.0)?;
    let reserve = parse_decimal(reserve)?;

    Some(balance / total_supply * reserve)
}

/// wPOKT per wallet (lowercased), summed over positions.
pub fn wallet_shares(
    positions: &[LiquidityPosition],
    wpokt_token_id: &str,
) -> HashMap<String, f64> {
    let mut shares: HashMap<String, f64> = HashMap::new();

    for position in positions {
        match position_share(position, wpokt_token_id) {
            Some(share) => {
                *shares.entry(position.user.id.to_lowercase()).or_insert(0.0) += share;
            }
            None => {
                log::warn!(
                    "⚠️  Skipping liquidity position of {} with unusable pair data",
                    position.user.id
                );
            }
        }
    }

    shares
}

/// Every operator gets an entry, starting from 0.
pub fn operator_totals(
    operators: &[(&String, &Vec<String>)],
    shares: &HashMap<String, f64>,
) -> IndexMap<String, f64> {
    operators
        .iter()
        .map(|(gateway_id, wallets)| {
            let total = wallets
                .iter()
                .filter_map(|wallet| shares.get(&wallet.to_lowercase()))
                .sum::<f64>();
            ((*gateway_id).clone(), total)
        })
        .collect()
}

pub struct WPoktValuator {
    graphql: GraphQlClient,
    wpokt_token_id: String,
    pool_id: String,
}

impl WPoktValuator {
    pub fn new(graphql: GraphQlClient, wpokt_token_id: String, pool_id: String) -> Self {
        Self {
            graphql,
            wpokt_token_id,
            pool_id,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let graphql = GraphQlClient::new(
            "UniswapV2",
            &config.uniswap_v2_endpoint_url,
            &[],
            config.http_timeout,
        )?;
        Ok(Self::new(
            graphql,
            config.wpokt_token_id.clone(),
            config.wpokt_pool_id.clone(),
        ))
    }

    async fn positions(&self, wallets: Vec<String>) -> Result<Vec<LiquidityPosition>> {
        let data: PositionsData = self
            .graphql
            .request(
                USERS_LIQUIDITY_GQL,
                json!({
                    "Users_Wallet_Addr": wallets,
                    "WPokt_ID": self.wpokt_token_id,
                    "Pool_ID": self.pool_id,
                }),
            )
            .await?;
        Ok(data.positions)
    }
}

#[async_trait]
impl LiquidityValuator for WPoktValuator {
    async fn valuate_operators(
        &self,
        operator_wallets: &IndexMap<String, Vec<String>>,
    ) -> Result<IndexMap<String, f64>> {
        let operators: Vec<(&String, &Vec<String>)> = operator_wallets.iter().collect();
        let mut liquidity = IndexMap::with_capacity(operators.len());

        for chunk in operators.chunks(OPERATOR_CHUNK) {
            let wallets: Vec<String> = chunk
                .iter()
                .flat_map(|(_, wallets)| wallets.iter().map(|w| w.to_lowercase()))
                .collect();

            let shares = if wallets.is_empty() {
                HashMap::new()
            } else {
                let positions = self.positions(wallets).await?;
                wallet_shares(&positions, &self.wpokt_token_id)
            };

            liquidity.extend(operator_totals(chunk, &shares));
        }

        log::info!("💧 Valuated liquidity for {} operators", liquidity.len());
        Ok(liquidity)
    }
}
