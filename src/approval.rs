use crate::{
    asset::{
        Address,
        AssetClass,
        Operation,
    },
    contract::{
        ContractInterface,
        TxHash,
    },
    error::ClaimError,
};
use std::time::Duration;
use tracing::{
    debug,
    info,
};

pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Authorization of `spender` to move `owner`'s assets of one class.
///
/// The approval state is never cached here: every check is a fresh contract
/// read, since any other component may change it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalGate {
    owner: Address,
    spender: Address,
    class: AssetClass,
}

impl ApprovalGate {
    pub fn new(owner: Address, spender: Address, class: AssetClass) -> Self {
        Self {
            owner,
            spender,
            class,
        }
    }

    /// Whether `operation` on `class` needs the owner's approval first.
    pub fn required_for(class: AssetClass, operation: Operation) -> bool {
        class.is_stakeable() && operation == Operation::Stake
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub async fn is_authorized<C: ContractInterface>(
        &self,
        contracts: &C,
    ) -> Result<bool, ClaimError> {
        let approved = contracts
            .is_approved_for_all(&self.owner, &self.spender, self.class)
            .await
            .map_err(|e| {
                ClaimError::Approval(format!("could not read approval state: {e}"))
            })?;
        debug!(
            class = %self.class,
            spender = %self.spender,
            approved,
            "approval state read"
        );
        Ok(approved)
    }

    /// Submit `setApprovalForAll(spender, true)`. Resolves once the wallet has
    /// accepted the prompt; the caller must wait for mining and re-check.
    pub async fn request_approval<C: ContractInterface>(
        &self,
        contracts: &C,
    ) -> Result<TxHash, ClaimError> {
        info!(class = %self.class, spender = %self.spender, "requesting approval");
        contracts
            .set_approval_for_all(self.class, &self.spender, true)
            .await
            .map_err(|e| ClaimError::Approval(e.to_string()))
    }
}

/// Gate plus how persistently to re-check it after an approval is mined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalPolicy {
    gate: ApprovalGate,
    recheck_attempts: u32,
    recheck_interval: Duration,
}

impl ApprovalPolicy {
    pub fn new(gate: ApprovalGate) -> Self {
        Self {
            gate,
            recheck_attempts: 1,
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
        }
    }

    pub fn with_rechecks(mut self, attempts: u32, interval: Duration) -> Self {
        self.recheck_attempts = attempts;
        self.recheck_interval = interval;
        self
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn recheck_attempts(&self) -> u32 {
        self.recheck_attempts
    }

    pub fn recheck_interval(&self) -> Duration {
        self.recheck_interval
    }
}
