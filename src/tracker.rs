use crate::{
    approval::ApprovalPolicy,
    asset::{
        AssetClass,
        AssetRef,
        Operation,
    },
    contract::{
        ContractInterface,
        PlannedCall,
        TxHash,
        TxStatus,
        WriteError,
    },
    error::ClaimError,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::broadcast,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

const PHASE_EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TxKind {
    Approve,
    Stake,
    Unstake,
    ClaimSingle,
    ClaimBatch,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxKind::Approve => "approve",
            TxKind::Stake => "stake",
            TxKind::Unstake => "unstake",
            TxKind::ClaimSingle => "claim",
            TxKind::ClaimBatch => "batch claim",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    CheckingApproval,
    AwaitingApprovalSignature,
    ApprovalSubmitted { hash: TxHash },
    Ready,
    AwaitingSignature,
    Pending { hash: TxHash },
    Confirmed { hash: TxHash },
    Reconciling { hash: TxHash },
    Failed { error: ClaimError },
}

impl Phase {
    /// A record in this phase blocks new actions on the same desk.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::CheckingApproval => "checking-approval",
            Phase::AwaitingApprovalSignature => "awaiting-approval-signature",
            Phase::ApprovalSubmitted { .. } => "approval-submitted",
            Phase::Ready => "ready",
            Phase::AwaitingSignature => "awaiting-signature",
            Phase::Pending { .. } => "pending",
            Phase::Confirmed { .. } => "confirmed",
            Phase::Reconciling { .. } => "reconciling",
            Phase::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One user-initiated write, from invocation until it settles or fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionRecord {
    pub kind: TxKind,
    /// Targets as they were at submission time.
    pub targets: Vec<AssetRef>,
    pub phase: Phase,
    pub approval_hash: Option<TxHash>,
    pub hash: Option<TxHash>,
    pub error: Option<ClaimError>,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhaseChange {
    pub class: AssetClass,
    pub operation: Operation,
    pub phase: Phase,
}

/// Drives the transaction record of a single desk.
///
/// Clones share the same record, so the idle gate holds even when the desk
/// is invoked again while an earlier action is suspended.
#[derive(Clone)]
pub struct TransactionTracker {
    class: AssetClass,
    operation: Operation,
    record: Arc<Mutex<Option<TransactionRecord>>>,
    events: broadcast::Sender<PhaseChange>,
    confirmation_timeout: Option<Duration>,
}

impl TransactionTracker {
    pub fn new(class: AssetClass, operation: Operation) -> Self {
        let (events, _) = broadcast::channel(PHASE_EVENT_CAPACITY);
        Self {
            class,
            operation,
            record: Arc::new(Mutex::new(None)),
            events,
            confirmation_timeout: None,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseChange> {
        self.events.subscribe()
    }

    pub fn record(&self) -> Option<TransactionRecord> {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock()
            .as_ref()
            .map(|r| r.phase.clone())
            .unwrap_or(Phase::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.phase().is_active()
    }

    pub fn status(&self) -> TxStatus {
        let guard = self.lock();
        let Some(record) = guard.as_ref() else {
            return TxStatus::default();
        };
        TxStatus {
            is_pending: matches!(
                record.phase,
                Phase::AwaitingSignature | Phase::AwaitingApprovalSignature
            ),
            is_confirming: matches!(
                record.phase,
                Phase::Pending { .. } | Phase::ApprovalSubmitted { .. }
            ),
            is_success: matches!(
                record.phase,
                Phase::Confirmed { .. } | Phase::Reconciling { .. }
            ),
            error: record.error.as_ref().map(ToString::to_string),
            hash: record.hash.clone(),
        }
    }

    /// Clear a failed record. Returns false if there was nothing to dismiss.
    pub fn dismiss(&self) -> bool {
        let dismissed = {
            let mut guard = self.lock();
            match guard.as_ref() {
                Some(record) if matches!(record.phase, Phase::Failed { .. }) => {
                    *guard = None;
                    true
                }
                _ => false,
            }
        };
        if dismissed {
            self.emit(Phase::Idle);
        }
        dismissed
    }

    /// Run `call` up to on-chain confirmation, securing approval first when
    /// `approval` is given. The record is left in `confirmed` on success and
    /// in `failed` on error; reconciliation takes it from there.
    pub async fn execute<C: ContractInterface>(
        &self,
        contracts: &C,
        approval: Option<&ApprovalPolicy>,
        call: &PlannedCall,
        targets: Vec<AssetRef>,
    ) -> Result<TxHash, ClaimError> {
        let first = if approval.is_some() {
            Phase::CheckingApproval
        } else {
            Phase::Ready
        };
        self.begin(call.kind(), targets, first)?;
        let guard = self.settle_guard();

        if let Some(policy) = approval {
            self.secure_approval(contracts, policy).await?;
            self.transition(Phase::Ready);
        }

        self.transition(Phase::AwaitingSignature);
        let hash = match call.submit(contracts).await {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail(ClaimError::from_submission(err))),
        };

        self.transition(Phase::Pending { hash: hash.clone() });
        if let Err(err) = self.confirm(contracts, &hash).await {
            return Err(self.fail(ClaimError::from_confirmation(&hash, err)));
        }

        self.transition(Phase::Confirmed { hash: hash.clone() });
        guard.disarm();
        Ok(hash)
    }

    /// Standalone approval. Returns the approval hash, or `None` when the
    /// spender was already authorized. The record returns to idle on success.
    pub async fn execute_approval<C: ContractInterface>(
        &self,
        contracts: &C,
        policy: &ApprovalPolicy,
    ) -> Result<Option<TxHash>, ClaimError> {
        self.begin(TxKind::Approve, Vec::new(), Phase::CheckingApproval)?;
        let _guard = self.settle_guard();
        let hash = self.secure_approval(contracts, policy).await?;
        if let Some(hash) = &hash {
            self.transition(Phase::Confirmed { hash: hash.clone() });
        }
        self.finish();
        Ok(hash)
    }

    async fn secure_approval<C: ContractInterface>(
        &self,
        contracts: &C,
        policy: &ApprovalPolicy,
    ) -> Result<Option<TxHash>, ClaimError> {
        let gate = policy.gate();
        match gate.is_authorized(contracts).await {
            Ok(true) => return Ok(None),
            Ok(false) => {}
            Err(err) => return Err(self.fail(err)),
        }

        self.transition(Phase::AwaitingApprovalSignature);
        let hash = match gate.request_approval(contracts).await {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail(err)),
        };

        self.transition(Phase::ApprovalSubmitted { hash: hash.clone() });
        if let Err(err) = self.confirm(contracts, &hash).await {
            return Err(self.fail(ClaimError::Approval(err.to_string())));
        }

        for attempt in 0..policy.recheck_attempts().max(1) {
            self.transition(Phase::CheckingApproval);
            if attempt > 0 {
                time::sleep(policy.recheck_interval()).await;
            }
            match gate.is_authorized(contracts).await {
                Ok(true) => return Ok(Some(hash)),
                Ok(false) => {
                    debug!(
                        class = %self.class,
                        attempt,
                        "approval confirmed but not yet visible"
                    );
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        Err(self.fail(ClaimError::Approval(format!(
            "approval {hash} was mined but the spender is still not authorized"
        ))))
    }

    async fn confirm<C: ContractInterface>(
        &self,
        contracts: &C,
        hash: &TxHash,
    ) -> Result<(), WriteError> {
        match self.confirmation_timeout {
            Some(limit) => time::timeout(limit, contracts.wait_for_confirmation(hash))
                .await
                .map_err(|_| WriteError::Timeout(limit))?,
            None => contracts.wait_for_confirmation(hash).await,
        }
    }

    /// Move a confirmed record into reconciliation.
    pub(crate) fn begin_reconcile(&self) {
        let hash = self.lock().as_ref().and_then(|r| r.hash.clone());
        match hash {
            Some(hash) => self.transition(Phase::Reconciling { hash }),
            None => warn!(
                class = %self.class,
                operation = %self.operation,
                "reconcile requested without a submitted transaction"
            ),
        }
    }

    /// Guard that settles the current record if the owning future is dropped
    /// before it reaches a resting phase.
    pub(crate) fn settle_guard(&self) -> SettleOnDrop<'_> {
        SettleOnDrop {
            tracker: self,
            armed: true,
        }
    }

    /// Settle a record whose action stopped being polled. Confirmed work is
    /// cleared; anything earlier fails so the desk is usable again.
    fn abandon(&self) {
        let (phase, hash) = {
            let guard = self.lock();
            let Some(record) = guard.as_ref() else {
                return;
            };
            (
                record.phase.clone(),
                record.hash.clone().or_else(|| record.approval_hash.clone()),
            )
        };
        match phase {
            Phase::Confirmed { .. } | Phase::Reconciling { .. } => {
                warn!(
                    class = %self.class,
                    operation = %self.operation,
                    %phase,
                    "action dropped before reconciling; clearing the record"
                );
                self.finish();
            }
            phase if phase.is_active() => {
                self.fail(ClaimError::Abandoned { hash });
            }
            _ => {}
        }
    }

    /// Drop the record and return to idle.
    pub(crate) fn finish(&self) {
        self.lock().take();
        debug!(class = %self.class, operation = %self.operation, "transaction record cleared");
        self.emit(Phase::Idle);
    }

    fn begin(
        &self,
        kind: TxKind,
        targets: Vec<AssetRef>,
        phase: Phase,
    ) -> Result<(), ClaimError> {
        {
            let mut guard = self.lock();
            if guard.as_ref().is_some_and(|r| r.phase.is_active()) {
                return Err(ClaimError::Busy {
                    class: self.class,
                    operation: self.operation,
                });
            }
            info!(
                class = %self.class,
                operation = %self.operation,
                %kind,
                targets = targets.len(),
                "starting transaction"
            );
            *guard = Some(TransactionRecord {
                kind,
                targets,
                phase: phase.clone(),
                approval_hash: None,
                hash: None,
                error: None,
                started_at: Utc::now(),
            });
        }
        self.emit(phase);
        Ok(())
    }

    fn transition(&self, phase: Phase) {
        {
            let mut guard = self.lock();
            let Some(record) = guard.as_mut() else {
                warn!(class = %self.class, %phase, "transition without an active record");
                return;
            };
            match &phase {
                Phase::ApprovalSubmitted { hash } => {
                    record.approval_hash = Some(hash.clone())
                }
                Phase::Pending { hash } => record.hash = Some(hash.clone()),
                Phase::Failed { error } => record.error = Some(error.clone()),
                _ => {}
            }
            debug!(
                class = %self.class,
                operation = %self.operation,
                from = %record.phase,
                to = %phase,
                "phase transition"
            );
            record.phase = phase.clone();
        }
        self.emit(phase);
    }

    fn fail(&self, error: ClaimError) -> ClaimError {
        warn!(
            class = %self.class,
            operation = %self.operation,
            category = %error.category(),
            error = %error,
            "transaction failed"
        );
        self.transition(Phase::Failed {
            error: error.clone(),
        });
        error
    }

    fn emit(&self, phase: Phase) {
        // no subscribers is fine
        let _ = self.events.send(PhaseChange {
            class: self.class,
            operation: self.operation,
            phase,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Option<TransactionRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct SettleOnDrop<'a> {
    tracker: &'a TransactionTracker,
    armed: bool,
}

impl SettleOnDrop<'_> {
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.abandon();
        }
    }
}
