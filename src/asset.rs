use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Category of claimable or stakeable item.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AssetClass {
    NftCst,
    NftRwlk,
    NftDonated,
    Erc20Donated,
    EthRaffle,
    EthStaking,
}

impl AssetClass {
    pub const ALL: [AssetClass; 6] = [
        AssetClass::NftCst,
        AssetClass::NftRwlk,
        AssetClass::NftDonated,
        AssetClass::Erc20Donated,
        AssetClass::EthRaffle,
        AssetClass::EthStaking,
    ];

    /// Path segment used by the read API.
    pub fn slug(self) -> &'static str {
        match self {
            AssetClass::NftCst => "nft-cst",
            AssetClass::NftRwlk => "nft-rwlk",
            AssetClass::NftDonated => "nft-donated",
            AssetClass::Erc20Donated => "erc20-donated",
            AssetClass::EthRaffle => "eth-raffle",
            AssetClass::EthStaking => "eth-staking",
        }
    }

    /// Classes that can be staked into a staking wallet.
    pub fn is_stakeable(self) -> bool {
        matches!(self, AssetClass::NftCst | AssetClass::NftRwlk)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetClass::NftCst => "CST NFT",
            AssetClass::NftRwlk => "Random Walk NFT",
            AssetClass::NftDonated => "donated NFT",
            AssetClass::Erc20Donated => "donated ERC-20",
            AssetClass::EthRaffle => "raffle ETH",
            AssetClass::EthStaking => "staking ETH",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Stake,
    Unstake,
    Claim,
}

impl Operation {
    /// The listing whose members are valid targets for this operation.
    pub fn listing(self) -> Listing {
        match self {
            Operation::Stake => Listing::Unstaked,
            Operation::Unstake => Listing::Staked,
            Operation::Claim => Listing::Unclaimed,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Stake => "stake",
            Operation::Unstake => "unstake",
            Operation::Claim => "claim",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Listing {
    Unclaimed,
    Unstaked,
    Staked,
}

impl Listing {
    pub fn slug(self) -> &'static str {
        match self {
            Listing::Unclaimed => "unclaimed",
            Listing::Unstaked => "unstaked",
            Listing::Staked => "staked",
        }
    }

    /// Whether members of this listing carry the settled (claimed/staked) flag.
    pub fn expects_settled(self) -> bool {
        matches!(self, Listing::Staked)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid address {input:?}: {reason}")]
pub struct AddressError {
    input: String,
    reason: &'static str,
}

/// 20-byte account or contract address.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let err = |reason| AddressError {
            input: raw.to_string(),
            reason,
        };
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| err("missing 0x prefix"))?;
        if digits.len() != 40 {
            return Err(err("expected 40 hex digits"));
        }
        let bytes = hex::decode(digits).map_err(|_| err("not hexadecimal"))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Identifier of one unit within its class: a token id, donation index or
/// staking action id, or for donated ERC-20 the (round, token) pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AssetId {
    Index(u64),
    Token { round: u64, token: Address },
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Index(index) => write!(f, "#{index}"),
            AssetId::Token { round, token } => write!(f, "round {round} token {token}"),
        }
    }
}

/// One claimable or stakeable unit as last reported by the read API.
///
/// Never patched in place: a refresh replaces the whole list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssetRef {
    pub class: AssetClass,
    pub id: AssetId,
    /// Token or wei amount for fungible classes, zero for NFTs.
    pub amount: u128,
    /// Claimed for claimable classes, staked for stakeable ones.
    pub settled: bool,
}

impl AssetRef {
    pub fn new(class: AssetClass, id: AssetId) -> Self {
        Self {
            class,
            id,
            amount: 0,
            settled: false,
        }
    }

    pub fn indexed(class: AssetClass, index: u64) -> Self {
        Self::new(class, AssetId::Index(index))
    }

    pub fn with_amount(mut self, amount: u128) -> Self {
        self.amount = amount;
        self
    }

    pub fn settled(mut self, settled: bool) -> Self {
        self.settled = settled;
        self
    }

    pub fn index(&self) -> Option<u64> {
        match self.id {
            AssetId::Index(index) => Some(index),
            AssetId::Token { .. } => None,
        }
    }
}
