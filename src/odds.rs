use crate::read_api::RoundSummary;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Default number of bidders drawn by the ETH raffle each round.
pub const DEFAULT_ETH_RAFFLE_WINNERS: u32 = 3;
/// Default number of bidders drawn by the NFT raffle each round.
pub const DEFAULT_NFT_RAFFLE_WINNERS: u32 = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RaffleCategory {
    Eth,
    Nft,
}

impl RaffleCategory {
    pub const ALL: [RaffleCategory; 2] = [RaffleCategory::Eth, RaffleCategory::Nft];
}

/// Winner counts assumed when the index does not report them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RaffleDefaults {
    pub eth_winners: u32,
    pub nft_winners: u32,
}

impl Default for RaffleDefaults {
    fn default() -> Self {
        Self {
            eth_winners: DEFAULT_ETH_RAFFLE_WINNERS,
            nft_winners: DEFAULT_NFT_RAFFLE_WINNERS,
        }
    }
}

impl RaffleDefaults {
    pub fn winners(&self, category: RaffleCategory) -> u32 {
        match category {
            RaffleCategory::Eth => self.eth_winners,
            RaffleCategory::Nft => self.nft_winners,
        }
    }
}

impl fmt::Display for RaffleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaffleCategory::Eth => write!(f, "ETH raffle"),
            RaffleCategory::Nft => write!(f, "NFT raffle"),
        }
    }
}

/// Probability that a bidder holding `user_bids` of `total_bids` wins at
/// least one of `winners` draws, treating draws as independent.
///
/// `1 - ((total - user) / total) ^ winners`, with no bids meaning no chance.
pub fn estimate_odds(total_bids: u64, user_bids: u64, winners: u32) -> f64 {
    if total_bids == 0 || user_bids == 0 || winners == 0 {
        return 0.0;
    }
    if user_bids >= total_bids {
        return 1.0;
    }
    let miss = (total_bids - user_bids) as f64 / total_bids as f64;
    let draws = i32::try_from(winners).unwrap_or(i32::MAX);
    1.0 - miss.powi(draws)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaffleOdds {
    pub category: RaffleCategory,
    pub winners: u32,
    pub probability: f64,
}

/// Odds for every raffle category of the round described by `summary`.
pub fn raffle_odds(summary: &RoundSummary, user_bids: u64) -> Vec<RaffleOdds> {
    RaffleCategory::ALL
        .iter()
        .map(|&category| {
            let winners = summary.winners(category);
            RaffleOdds {
                category,
                winners,
                probability: estimate_odds(summary.total_bids, user_bids, winners),
            }
        })
        .collect()
}
