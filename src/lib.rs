//! Orchestration of wallet-signed claim and stake transactions for the
//! Cosmic Signature game client.
//!
//! A [`desk::AssetDesk`] is the unit a page operates on: one asset class and
//! one operation, with its own item list, selection and transaction record.
//! Desks for different classes share the read API and contract interface but
//! never each other's state.

pub mod approval;
pub mod asset;
pub mod config;
pub mod contract;
pub mod desk;
pub mod error;
pub mod indexer_client;
pub mod notice;
pub mod odds;
pub mod read_api;
pub mod reconcile;
pub mod selection;
pub mod tracker;

pub use error::{
    ClaimError,
    Result,
};
