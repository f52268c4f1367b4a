use crate::{
    asset::{
        Address,
        AssetClass,
        AssetId,
        AssetRef,
        Listing,
    },
    odds::{
        RaffleCategory,
        RaffleDefaults,
    },
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid payload: {0}")]
    Payload(String),
}

/// Indexed view of the game, eventually consistent with the chain.
pub trait ReadApi {
    /// Bid totals and raffle settings for `round`, or the current round.
    fn round_summary(
        &self,
        round: Option<u64>,
    ) -> impl Future<Output = Result<RoundSummary, ReadError>>;

    fn user_bids(
        &self,
        owner: &Address,
        round: u64,
    ) -> impl Future<Output = Result<u64, ReadError>>;

    fn listing(
        &self,
        owner: &Address,
        class: AssetClass,
        listing: Listing,
    ) -> impl Future<Output = Result<Vec<AssetRef>, ReadError>>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoundSummary {
    pub round: u64,
    pub total_bids: u64,
    pub eth_raffle_winners: u32,
    pub nft_raffle_winners: u32,
}

impl RoundSummary {
    pub fn winners(&self, category: RaffleCategory) -> u32 {
        match category {
            RaffleCategory::Eth => self.eth_raffle_winners,
            RaffleCategory::Nft => self.nft_raffle_winners,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RoundSummaryDto {
    round_num: u64,
    total_bids: u64,
    num_raffle_eth_winners: Option<u32>,
    num_raffle_nft_winners: Option<u32>,
}

impl RoundSummaryDto {
    fn into_summary(self, defaults: &RaffleDefaults) -> RoundSummary {
        RoundSummary {
            round: self.round_num,
            total_bids: self.total_bids,
            eth_raffle_winners: self
                .num_raffle_eth_winners
                .unwrap_or_else(|| defaults.winners(RaffleCategory::Eth)),
            nft_raffle_winners: self
                .num_raffle_nft_winners
                .unwrap_or_else(|| defaults.winners(RaffleCategory::Nft)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UserBidsDto {
    pub(crate) num_bids: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AssetDto {
    id: Option<u64>,
    round_num: Option<u64>,
    token_addr: Option<Address>,
    /// Decimal string; wei and token amounts overflow JSON numbers.
    amount: Option<String>,
    claimed: bool,
    staked: bool,
}

impl AssetDto {
    pub(crate) fn into_asset(self, class: AssetClass) -> Result<AssetRef, ReadError> {
        let id = match (class, self.round_num, self.token_addr, self.id) {
            (AssetClass::Erc20Donated, Some(round), Some(token), _) => {
                AssetId::Token { round, token }
            }
            (AssetClass::Erc20Donated, ..) => {
                return Err(ReadError::Payload(format!(
                    "{class} entry without round_num and token_addr"
                )));
            }
            (_, _, _, Some(id)) => AssetId::Index(id),
            (_, _, _, None) => {
                return Err(ReadError::Payload(format!("{class} entry without id")));
            }
        };
        let amount = match self.amount.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw.parse::<u128>().map_err(|e| {
                ReadError::Payload(format!("{class} {id} amount {raw:?}: {e}"))
            })?,
        };
        Ok(AssetRef {
            class,
            id,
            amount,
            settled: self.claimed || self.staked,
        })
    }
}

pub(crate) fn parse_round_summary(
    bytes: &[u8],
    defaults: &RaffleDefaults,
) -> Result<RoundSummary, ReadError> {
    let dto: RoundSummaryDto =
        serde_json::from_slice(bytes).map_err(|e| ReadError::Payload(e.to_string()))?;
    Ok(dto.into_summary(defaults))
}

pub(crate) fn parse_user_bids(bytes: &[u8]) -> Result<u64, ReadError> {
    let dto: UserBidsDto =
        serde_json::from_slice(bytes).map_err(|e| ReadError::Payload(e.to_string()))?;
    Ok(dto.num_bids)
}

pub(crate) fn parse_listing(
    class: AssetClass,
    bytes: &[u8],
) -> Result<Vec<AssetRef>, ReadError> {
    let dtos: Vec<AssetDto> =
        serde_json::from_slice(bytes).map_err(|e| ReadError::Payload(e.to_string()))?;
    dtos.into_iter().map(|dto| dto.into_asset(class)).collect()
}
