use crate::{
    approval::{
        ApprovalGate,
        ApprovalPolicy,
        DEFAULT_RECHECK_INTERVAL,
    },
    asset::{
        Address,
        AssetClass,
        AssetId,
        AssetRef,
        Operation,
    },
    contract::{
        ContractInterface,
        PlannedCall,
        TxHash,
        TxStatus,
    },
    error::ClaimError,
    notice::{
        Notice,
        NoticeBoard,
        Severity,
    },
    read_api::ReadApi,
    reconcile::ReconciliationScheduler,
    selection::{
        SelectionSet,
        page_ids,
    },
    tracker::{
        Phase,
        TransactionTracker,
        TxKind,
    },
};
use chrono::Utc;
use std::{
    collections::{
        BTreeSet,
        HashMap,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tracing::{
    debug,
    error,
    info,
};

/// Collaborators shared by every desk on a page.
pub struct DeskContext<R, C> {
    owner: Address,
    read_api: Arc<R>,
    contracts: Arc<C>,
    staking_wallets: HashMap<AssetClass, Address>,
    scheduler: ReconciliationScheduler,
    approval_rechecks: u32,
    approval_recheck_interval: Duration,
    confirmation_timeout: Option<Duration>,
    notices: NoticeBoard,
}

impl<R, C> DeskContext<R, C> {
    pub fn new(owner: Address, read_api: Arc<R>, contracts: Arc<C>) -> Self {
        Self {
            owner,
            read_api,
            contracts,
            staking_wallets: HashMap::new(),
            scheduler: ReconciliationScheduler::default(),
            approval_rechecks: 1,
            approval_recheck_interval: DEFAULT_RECHECK_INTERVAL,
            confirmation_timeout: None,
            notices: NoticeBoard::default(),
        }
    }

    pub fn with_staking_wallet(mut self, class: AssetClass, wallet: Address) -> Self {
        self.staking_wallets.insert(class, wallet);
        self
    }

    pub fn with_scheduler(mut self, scheduler: ReconciliationScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_approval_rechecks(mut self, attempts: u32, interval: Duration) -> Self {
        self.approval_rechecks = attempts;
        self.approval_recheck_interval = interval;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_notices(mut self, notices: NoticeBoard) -> Self {
        self.notices = notices;
        self
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Build the desk for one class and operation.
    pub fn desk(
        &self,
        class: AssetClass,
        operation: Operation,
    ) -> Result<AssetDesk<R, C>, ClaimError> {
        if !PlannedCall::supports(class, operation) {
            return Err(ClaimError::Unsupported { class, operation });
        }
        let approval = if ApprovalGate::required_for(class, operation) {
            let spender = self.staking_wallets.get(&class).copied().ok_or_else(|| {
                ClaimError::validation(format!(
                    "no staking wallet configured for {class}"
                ))
            })?;
            let gate = ApprovalGate::new(self.owner, spender, class);
            Some(
                ApprovalPolicy::new(gate)
                    .with_rechecks(self.approval_rechecks, self.approval_recheck_interval),
            )
        } else {
            None
        };
        Ok(AssetDesk {
            class,
            operation,
            owner: self.owner,
            read_api: self.read_api.clone(),
            contracts: self.contracts.clone(),
            approval,
            scheduler: self.scheduler,
            tracker: TransactionTracker::new(class, operation)
                .with_confirmation_timeout(self.confirmation_timeout),
            view: Arc::new(Mutex::new(DeskView::default())),
            notices: self.notices.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct DeskView {
    items: Vec<AssetRef>,
    selection: SelectionSet,
}

/// Item list, selection and transaction record for one asset class and
/// operation. Public actions never fail: errors become notices.
pub struct AssetDesk<R, C> {
    class: AssetClass,
    operation: Operation,
    owner: Address,
    read_api: Arc<R>,
    contracts: Arc<C>,
    approval: Option<ApprovalPolicy>,
    scheduler: ReconciliationScheduler,
    tracker: TransactionTracker,
    view: Arc<Mutex<DeskView>>,
    notices: NoticeBoard,
}

impl<R, C> AssetDesk<R, C> {
    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    pub fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    pub fn status(&self) -> TxStatus {
        self.tracker.status()
    }

    /// Controls are disabled while this desk's record is in flight.
    pub fn is_busy(&self) -> bool {
        self.tracker.is_busy()
    }

    pub fn requires_approval(&self) -> bool {
        self.approval.is_some()
    }

    pub fn items(&self) -> Vec<AssetRef> {
        self.lock_view().items.clone()
    }

    pub fn selection(&self) -> SelectionSet {
        self.lock_view().selection.clone()
    }

    /// Toggle `id` if it is one of the loaded items. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&self, id: AssetId) -> bool {
        let mut view = self.lock_view();
        if !view.items.iter().any(|item| item.id == id) {
            return false;
        }
        view.selection.toggle(id)
    }

    pub fn select_all(&self) {
        let mut view = self.lock_view();
        let ids: Vec<_> = view.items.iter().map(|item| item.id).collect();
        view.selection.select_all(ids);
    }

    pub fn select_page(&self, page: usize, per_page: usize) {
        let mut view = self.lock_view();
        let ids = page_ids(&view.items, page, per_page);
        view.selection.select_page(ids);
    }

    pub fn clear_selection(&self) {
        self.lock_view().selection.clear();
    }

    /// Clear a failed record so the error is no longer shown.
    pub fn dismiss(&self) -> bool {
        self.tracker.dismiss()
    }

    /// Swap in a freshly read item list and drop selected ids that are no
    /// longer valid targets.
    fn replace_items(&self, fetched: Vec<AssetRef>) {
        let wants_settled = self.operation.listing().expects_settled();
        let items: Vec<_> = fetched
            .into_iter()
            .filter(|item| item.class == self.class && item.settled == wants_settled)
            .collect();
        let valid: BTreeSet<_> = items.iter().map(|item| item.id).collect();
        let mut view = self.lock_view();
        let dropped = view.selection.retain(&valid);
        if dropped > 0 {
            debug!(
                class = %self.class,
                operation = %self.operation,
                dropped,
                "dropped stale selections"
            );
        }
        view.items = items;
    }

    fn targets_for(&self, ids: &BTreeSet<AssetId>) -> Vec<AssetRef> {
        self.lock_view()
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect()
    }

    fn notify(&self, severity: Severity, message: String) -> Notice {
        let notice = Notice {
            severity,
            class: self.class,
            operation: self.operation,
            message,
            at: Utc::now(),
        };
        self.notices.push(notice.clone());
        notice
    }

    fn notify_error(&self, err: &ClaimError) -> Notice {
        error!(
            class = %self.class,
            operation = %self.operation,
            category = %err.category(),
            error = %err,
            "action failed"
        );
        self.notify(Severity::Error, err.to_string())
    }

    fn lock_view(&self) -> MutexGuard<'_, DeskView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: ReadApi, C: ContractInterface> AssetDesk<R, C> {
    /// Reload this desk's listing from the read API.
    pub async fn refresh(&self) -> Notice {
        match self.reload().await {
            Ok(count) => self.notify(Severity::Info, format!("{count} items loaded")),
            Err(err) => self.notify_error(&err),
        }
    }

    /// Act on every selected item in one transaction.
    pub async fn submit_selected(&self) -> Notice {
        let ids: BTreeSet<_> = self.lock_view().selection.iter().copied().collect();
        let targets = self.targets_for(&ids);
        self.run(targets).await
    }

    /// Act on a single item regardless of the selection.
    pub async fn submit_one(&self, id: AssetId) -> Notice {
        let targets = self.targets_for(&BTreeSet::from([id]));
        if targets.is_empty() {
            let err = ClaimError::validation(format!(
                "{} {id} is not available to {}",
                self.class, self.operation
            ));
            return self.notify_error(&err);
        }
        self.run(targets).await
    }

    /// Approve the staking wallet without staking anything yet.
    pub async fn approve(&self) -> Notice {
        let Some(policy) = &self.approval else {
            return self.notify(
                Severity::Info,
                format!("{} {} needs no approval", self.class, self.operation),
            );
        };
        match self
            .tracker
            .execute_approval(self.contracts.as_ref(), policy)
            .await
        {
            Ok(Some(hash)) => {
                self.notify(Severity::Success, format!("approval confirmed ({hash})"))
            }
            Ok(None) => self.notify(Severity::Info, "already approved".to_string()),
            Err(err) => self.notify_error(&err),
        }
    }

    async fn run(&self, targets: Vec<AssetRef>) -> Notice {
        let count = targets.len();
        match self.try_run(targets).await {
            Ok((hash, kind, stale)) => {
                let mut message = format!("{kind} of {count} {} confirmed ({hash})", self.class);
                if stale {
                    message.push_str("; list may be stale until the next refresh");
                }
                self.notify(Severity::Success, message)
            }
            Err(err) => self.notify_error(&err),
        }
    }

    async fn try_run(
        &self,
        targets: Vec<AssetRef>,
    ) -> Result<(TxHash, TxKind, bool), ClaimError> {
        if self.tracker.is_busy() {
            return Err(ClaimError::Busy {
                class: self.class,
                operation: self.operation,
            });
        }
        let call = PlannedCall::plan(self.class, self.operation, &targets)?;
        let kind = call.kind();
        let hash = self
            .tracker
            .execute(
                self.contracts.as_ref(),
                self.approval.as_ref(),
                &call,
                targets,
            )
            .await?;

        let refresh = async {
            let result = self.reload().await.map(|_| ());
            self.clear_selection();
            result
        };
        let stale = self.scheduler.reconcile(&self.tracker, refresh).await.is_err();
        Ok((hash, kind, stale))
    }

    async fn reload(&self) -> Result<usize, ClaimError> {
        let fetched = self
            .read_api
            .listing(&self.owner, self.class, self.operation.listing())
            .await?;
        self.replace_items(fetched);
        let count = self.lock_view().items.len();
        info!(
            class = %self.class,
            operation = %self.operation,
            count,
            "listing refreshed"
        );
        Ok(count)
    }
}
