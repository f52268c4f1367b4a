use crate::{
    asset::{
        Address,
        AssetClass,
        AssetId,
        AssetRef,
        Operation,
    },
    error::ClaimError,
    tracker::TxKind,
};
use itertools::Itertools;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for TxHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The user declined the wallet prompt.
    #[error("rejected in wallet: {0}")]
    Rejected(String),

    #[error("reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("no confirmation within {0:?}")]
    Timeout(std::time::Duration),
}

/// Shape of the status object the wallet layer exposes for one write.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxStatus {
    /// Waiting for the wallet to sign.
    pub is_pending: bool,
    /// Submitted and waiting to be mined.
    pub is_confirming: bool,
    pub is_success: bool,
    pub error: Option<String>,
    pub hash: Option<TxHash>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DonatedTokenClaim {
    pub round: u64,
    pub token: Address,
    pub amount: u128,
}

/// Contract reads and writes the core depends on.
///
/// Every write resolves once the wallet has accepted the prompt, returning
/// the transaction hash. Mining is observed separately through
/// [`ContractInterface::wait_for_confirmation`].
pub trait ContractInterface {
    fn is_approved_for_all(
        &self,
        owner: &Address,
        operator: &Address,
        class: AssetClass,
    ) -> impl Future<Output = Result<bool, WriteError>>;

    fn set_approval_for_all(
        &self,
        class: AssetClass,
        operator: &Address,
        approved: bool,
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn stake(
        &self,
        class: AssetClass,
        token_id: u64,
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn stake_many(
        &self,
        class: AssetClass,
        token_ids: &[u64],
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn unstake(
        &self,
        class: AssetClass,
        action_id: u64,
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn unstake_many(
        &self,
        class: AssetClass,
        action_ids: &[u64],
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn claim_donated_nft(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn claim_many_donated_nfts(
        &self,
        indexes: &[u64],
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn claim_donated_token(
        &self,
        claim: &DonatedTokenClaim,
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn claim_many_donated_tokens(
        &self,
        claims: &[DonatedTokenClaim],
    ) -> impl Future<Output = Result<TxHash, WriteError>>;

    fn withdraw_eth(&self) -> impl Future<Output = Result<TxHash, WriteError>>;

    /// Resolves once the transaction is mined, or with the revert.
    fn wait_for_confirmation(
        &self,
        hash: &TxHash,
    ) -> impl Future<Output = Result<(), WriteError>>;
}

/// A validated write, ready to hand to the wallet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlannedCall {
    Stake { class: AssetClass, token_id: u64 },
    StakeMany { class: AssetClass, token_ids: Vec<u64> },
    Unstake { class: AssetClass, action_id: u64 },
    UnstakeMany { class: AssetClass, action_ids: Vec<u64> },
    ClaimDonatedNft { index: u64 },
    ClaimManyDonatedNfts { indexes: Vec<u64> },
    ClaimDonatedToken(DonatedTokenClaim),
    ClaimManyDonatedTokens(Vec<DonatedTokenClaim>),
    WithdrawEth,
}

impl PlannedCall {
    pub fn supports(class: AssetClass, operation: Operation) -> bool {
        match operation {
            Operation::Stake | Operation::Unstake => class.is_stakeable(),
            Operation::Claim => !class.is_stakeable(),
        }
    }

    /// Validate `targets` and pick the contract call that acts on all of them
    /// in one transaction.
    pub fn plan(
        class: AssetClass,
        operation: Operation,
        targets: &[AssetRef],
    ) -> Result<Self, ClaimError> {
        if !Self::supports(class, operation) {
            return Err(ClaimError::Unsupported { class, operation });
        }
        if targets.is_empty() {
            return Err(ClaimError::validation(format!(
                "select at least one {class} to {operation}"
            )));
        }
        if let Some(stray) = targets.iter().find(|t| t.class != class) {
            return Err(ClaimError::validation(format!(
                "{} {} cannot be included in a {class} {operation}",
                stray.class, stray.id
            )));
        }
        let wants_settled = operation.listing().expects_settled();
        if let Some(stale) = targets.iter().find(|t| t.settled != wants_settled) {
            let state = match operation {
                Operation::Stake => "already staked",
                Operation::Unstake => "not staked",
                Operation::Claim => "already claimed",
            };
            return Err(ClaimError::validation(format!(
                "{class} {} is {state}",
                stale.id
            )));
        }
        let duplicates = targets.iter().map(|t| t.id).duplicates().count();
        if duplicates > 0 {
            return Err(ClaimError::validation(
                "the same item was selected more than once",
            ));
        }

        match (class, operation) {
            (AssetClass::NftCst | AssetClass::NftRwlk, Operation::Stake) => {
                let mut ids = indexes(class, targets)?;
                if ids.len() == 1 {
                    Ok(PlannedCall::Stake {
                        class,
                        token_id: ids.remove(0),
                    })
                } else {
                    Ok(PlannedCall::StakeMany {
                        class,
                        token_ids: ids,
                    })
                }
            }
            (AssetClass::NftCst | AssetClass::NftRwlk, Operation::Unstake) => {
                Ok(Self::unstake_call(class, indexes(class, targets)?))
            }
            // staking rewards are paid out when the CST position is unstaked
            (AssetClass::EthStaking, Operation::Claim) => Ok(Self::unstake_call(
                AssetClass::NftCst,
                indexes(class, targets)?,
            )),
            (AssetClass::NftDonated, Operation::Claim) => {
                let mut ids = indexes(class, targets)?;
                if ids.len() == 1 {
                    Ok(PlannedCall::ClaimDonatedNft {
                        index: ids.remove(0),
                    })
                } else {
                    Ok(PlannedCall::ClaimManyDonatedNfts { indexes: ids })
                }
            }
            (AssetClass::Erc20Donated, Operation::Claim) => {
                let mut claims = targets
                    .iter()
                    .map(|t| match t.id {
                        AssetId::Token { round, token } if t.amount > 0 => {
                            Ok(DonatedTokenClaim {
                                round,
                                token,
                                amount: t.amount,
                            })
                        }
                        AssetId::Token { .. } => Err(ClaimError::validation(format!(
                            "{class} {} has nothing to claim",
                            t.id
                        ))),
                        AssetId::Index(_) => Err(ClaimError::validation(format!(
                            "{class} {} is missing its token address",
                            t.id
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if claims.len() == 1 {
                    Ok(PlannedCall::ClaimDonatedToken(claims.remove(0)))
                } else {
                    Ok(PlannedCall::ClaimManyDonatedTokens(claims))
                }
            }
            // withdraws every pending raffle deposit at once
            (AssetClass::EthRaffle, Operation::Claim) => Ok(PlannedCall::WithdrawEth),
            (class, operation) => Err(ClaimError::Unsupported { class, operation }),
        }
    }

    fn unstake_call(class: AssetClass, mut action_ids: Vec<u64>) -> Self {
        if action_ids.len() == 1 {
            PlannedCall::Unstake {
                class,
                action_id: action_ids.remove(0),
            }
        } else {
            PlannedCall::UnstakeMany { class, action_ids }
        }
    }

    pub fn kind(&self) -> TxKind {
        match self {
            PlannedCall::Stake { .. } | PlannedCall::StakeMany { .. } => TxKind::Stake,
            PlannedCall::Unstake { .. } | PlannedCall::UnstakeMany { .. } => {
                TxKind::Unstake
            }
            PlannedCall::ClaimDonatedNft { .. }
            | PlannedCall::ClaimDonatedToken(_)
            | PlannedCall::WithdrawEth => TxKind::ClaimSingle,
            PlannedCall::ClaimManyDonatedNfts { .. }
            | PlannedCall::ClaimManyDonatedTokens(_) => TxKind::ClaimBatch,
        }
    }

    pub async fn submit<C: ContractInterface>(
        &self,
        contracts: &C,
    ) -> Result<TxHash, WriteError> {
        match self {
            PlannedCall::Stake { class, token_id } => {
                contracts.stake(*class, *token_id).await
            }
            PlannedCall::StakeMany { class, token_ids } => {
                contracts.stake_many(*class, token_ids).await
            }
            PlannedCall::Unstake { class, action_id } => {
                contracts.unstake(*class, *action_id).await
            }
            PlannedCall::UnstakeMany { class, action_ids } => {
                contracts.unstake_many(*class, action_ids).await
            }
            PlannedCall::ClaimDonatedNft { index } => {
                contracts.claim_donated_nft(*index).await
            }
            PlannedCall::ClaimManyDonatedNfts { indexes } => {
                contracts.claim_many_donated_nfts(indexes).await
            }
            PlannedCall::ClaimDonatedToken(claim) => {
                contracts.claim_donated_token(claim).await
            }
            PlannedCall::ClaimManyDonatedTokens(claims) => {
                contracts.claim_many_donated_tokens(claims).await
            }
            PlannedCall::WithdrawEth => contracts.withdraw_eth().await,
        }
    }
}

fn indexes(class: AssetClass, targets: &[AssetRef]) -> Result<Vec<u64>, ClaimError> {
    targets
        .iter()
        .map(|t| {
            t.index().ok_or_else(|| {
                ClaimError::validation(format!("{class} {} has no numeric id", t.id))
            })
        })
        .collect()
}
