//! Recalculates POKT staker credentials from on-chain state.

pub mod config;
pub mod dns;
pub mod error;
pub mod graphql;
pub mod pda;
pub mod pipeline;
pub mod poktscan;
pub mod wpokt;

pub use error::{error_chain, Error, Result};
