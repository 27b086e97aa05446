//! Issued credentials (PDAs) and the MyGateway API that owns them

pub mod client;
pub mod types;

pub use client::MyGatewayClient;
pub use types::{
    Claim, IssuedCredential, PdaStatus, PdaType, StakerClaim, StakerKind, StakerSubtype, Wallet,
};
