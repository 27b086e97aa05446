//! Issued credential (PDA) model as returned by MyGateway
//!
//! The claim is tagged by `pdaType`; only staker claims carry a node type,
//! service domain and wallets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdaType {
    Citizen,
    Builder,
    Staker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdaStatus {
    Valid,
    Suspended,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakerSubtype {
    Validator,
    #[serde(rename = "Liquidity Provider")]
    LiquidityProvider,
    Gateway,
}

/// Custodian nodes are identified by service domain, non-custodian nodes by
/// their output wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StakerKind {
    Custodian,
    NonCustodian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub amount: f64,
}

/// Citizen and builder claims only carry a subtype label and a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeClaim {
    #[serde(rename = "pdaSubtype")]
    pub pda_subtype: String,
    #[serde(default)]
    pub point: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakerClaim {
    #[serde(rename = "pdaSubtype")]
    pub pda_subtype: StakerSubtype,
    #[serde(rename = "type", default)]
    pub kind: Option<StakerKind>,
    #[serde(rename = "serviceDomain", default)]
    pub service_domain: Option<String>,
    #[serde(default)]
    pub wallets: Vec<Wallet>,
    #[serde(default)]
    pub point: f64,
}

impl StakerClaim {
    pub fn first_wallet(&self) -> Option<&str> {
        self.wallets.first().map(|w| w.address.as_str())
    }

    pub fn is_validator(&self, kind: StakerKind) -> bool {
        self.pda_subtype == StakerSubtype::Validator && self.kind == Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pdaType", rename_all = "lowercase")]
pub enum Claim {
    Citizen(BadgeClaim),
    Builder(BadgeClaim),
    Staker(StakerClaim),
}

impl Claim {
    pub fn pda_type(&self) -> PdaType {
        match self {
            Claim::Citizen(_) => PdaType::Citizen,
            Claim::Builder(_) => PdaType::Builder,
            Claim::Staker(_) => PdaType::Staker,
        }
    }

    pub fn point(&self) -> f64 {
        match self {
            Claim::Citizen(c) | Claim::Builder(c) => c.point,
            Claim::Staker(c) => c.point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "gatewayId")]
    pub gateway_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAsset {
    pub claim: Claim,
    pub owner: Owner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub id: String,
    pub status: PdaStatus,
    #[serde(rename = "dataAsset")]
    pub data_asset: DataAsset,
}

impl IssuedCredential {
    pub fn owner_gateway_id(&self) -> &str {
        &self.data_asset.owner.gateway_id
    }

    pub fn claim(&self) -> &Claim {
        &self.data_asset.claim
    }

    pub fn staker_claim(&self) -> Option<&StakerClaim> {
        match &self.data_asset.claim {
            Claim::Staker(claim) => Some(claim),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == PdaStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_custodian_validator() {
        let json = r#"{
            "id": "pda1",
            "status": "Valid",
            "dataAsset": {
                "claim": {
                    "point": 10,
                    "pdaType": "staker",
                    "pdaSubtype": "Validator",
                    "type": "custodian",
                    "serviceDomain": "example.com",
                    "wallets": [{ "address": "w1", "amount": 1 }]
                },
                "owner": { "gatewayId": "gw1" }
            }
        }"#;

        let credential: IssuedCredential = serde_json::from_str(json).unwrap();
        let claim = credential.staker_claim().unwrap();

        assert!(credential.is_valid());
        assert_eq!(credential.owner_gateway_id(), "gw1");
        assert!(claim.is_validator(StakerKind::Custodian));
        assert!(!claim.is_validator(StakerKind::NonCustodian));
        assert_eq!(claim.service_domain.as_deref(), Some("example.com"));
        assert_eq!(claim.first_wallet(), Some("w1"));
        assert_eq!(credential.claim().point(), 10.0);
    }

    #[test]
    fn test_deserialize_liquidity_provider_without_staker_fields() {
        let json = r#"{
            "id": "pda2",
            "status": "Valid",
            "dataAsset": {
                "claim": { "point": 4, "pdaType": "staker", "pdaSubtype": "Liquidity Provider" },
                "owner": { "gatewayId": "gw2" }
            }
        }"#;

        let credential: IssuedCredential = serde_json::from_str(json).unwrap();
        let claim = credential.staker_claim().unwrap();

        assert_eq!(claim.pda_subtype, StakerSubtype::LiquidityProvider);
        assert_eq!(claim.kind, None);
        assert!(claim.wallets.is_empty());
    }

    #[test]
    fn test_deserialize_citizen_and_builder() {
        let json = r#"{
            "id": "pda3",
            "status": "Suspended",
            "dataAsset": {
                "claim": { "point": 1, "pdaType": "citizen", "pdaSubtype": "POKT DNA" },
                "owner": { "gatewayId": "gw3" }
            }
        }"#;

        let credential: IssuedCredential = serde_json::from_str(json).unwrap();

        assert!(!credential.is_valid());
        assert_eq!(credential.claim().pda_type(), PdaType::Citizen);
        assert!(credential.staker_claim().is_none());

        let builder: Claim = serde_json::from_str(
            r#"{ "pdaType": "builder", "pdaSubtype": "OG Governor", "point": 2 }"#,
        )
        .unwrap();
        assert_eq!(builder.pda_type(), PdaType::Builder);
    }

    #[test]
    fn test_staker_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&StakerKind::NonCustodian).unwrap(),
            "\"non-custodian\""
        );
        assert_eq!(
            serde_json::to_string(&StakerSubtype::LiquidityProvider).unwrap(),
            "\"Liquidity Provider\""
        );
        assert_eq!(serde_json::to_string(&PdaType::Staker).unwrap(), "\"staker\"");
    }
}
