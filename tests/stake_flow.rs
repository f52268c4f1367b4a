use crate::fakes::*;
use cosmic_claims::{
    asset::{
        AssetClass,
        AssetRef,
        Listing,
        Operation,
    },
    desk::DeskContext,
    error::{
        ClaimError,
        ErrorCategory,
    },
    notice::Severity,
    tracker::Phase,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

fn cst(ids: impl IntoIterator<Item = u64>) -> Vec<AssetRef> {
    ids.into_iter()
        .map(|id| AssetRef::indexed(AssetClass::NftCst, id))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn submit_selected__not_yet_approved__approves_before_staking() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([10, 11]));
    let contracts = FakeContracts::linked_to(&index);
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();
    let mut events = desk.tracker().subscribe();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert_eq!(notice.severity, Severity::Success, "{notice}");
    let wallet = cst_staking_wallet();
    assert_eq!(
        contracts.calls(),
        vec![
            Call::IsApproved {
                class: AssetClass::NftCst,
                operator: wallet
            },
            Call::SetApproval {
                class: AssetClass::NftCst,
                operator: wallet
            },
            Call::WaitForConfirmation(hash(1)),
            Call::IsApproved {
                class: AssetClass::NftCst,
                operator: wallet
            },
            Call::Stake {
                class: AssetClass::NftCst,
                ids: vec![10, 11]
            },
            Call::WaitForConfirmation(hash(2)),
        ]
    );
    let phases: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|change| change.phase)
        .collect();
    assert_eq!(
        phases,
        vec![
            Phase::CheckingApproval,
            Phase::AwaitingApprovalSignature,
            Phase::ApprovalSubmitted { hash: hash(1) },
            Phase::CheckingApproval,
            Phase::Ready,
            Phase::AwaitingSignature,
            Phase::Pending { hash: hash(2) },
            Phase::Confirmed { hash: hash(2) },
            Phase::Reconciling { hash: hash(2) },
            Phase::Idle,
        ]
    );
    assert!(contracts.is_approved(AssetClass::NftCst));
    assert!(desk.items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submit_selected__already_approved__stakes_directly() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([10]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.approve(AssetClass::NftCst);
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert_eq!(notice.severity, Severity::Success, "{notice}");
    assert_eq!(
        contracts.calls(),
        vec![
            Call::IsApproved {
                class: AssetClass::NftCst,
                operator: cst_staking_wallet()
            },
            Call::Stake {
                class: AssetClass::NftCst,
                ids: vec![10]
            },
            Call::WaitForConfirmation(hash(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn submit_selected__approval_rejected__fails_without_staking() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([1, 2]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.reject_approval();
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(notice.is_error());
    let Phase::Failed { error } = desk.phase() else {
        panic!("expected a failed record, got {}", desk.phase());
    };
    assert_eq!(error.category(), ErrorCategory::Approval);
    assert!(
        !contracts
            .writes()
            .iter()
            .any(|call| matches!(call, Call::Stake { .. }))
    );
    assert_eq!(desk.selection().len(), 2);
    assert!(!contracts.is_approved(AssetClass::NftCst));
}

#[tokio::test(start_paused = true)]
async fn submit_selected__stake_signature_rejected__is_a_signature_error() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([5]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.approve(AssetClass::NftCst);
    contracts.reject_writes();
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(notice.is_error());
    let Phase::Failed { error } = desk.phase() else {
        panic!("expected a failed record, got {}", desk.phase());
    };
    assert_eq!(error.category(), ErrorCategory::Signature);
    assert_eq!(desk.status().hash, None);
}

#[tokio::test(start_paused = true)]
async fn approve__standalone__returns_to_idle_and_is_not_repeated() {
    // given
    let index = FakeReadApi::new();
    let contracts = FakeContracts::linked_to(&index);
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftRwlk, Operation::Stake).unwrap();

    // when
    let first = desk.approve().await;
    let second = desk.approve().await;

    // then
    assert_eq!(first.severity, Severity::Success, "{first}");
    assert_eq!(second.message, "already approved");
    assert_eq!(desk.phase(), Phase::Idle);
    assert_eq!(
        contracts.writes(),
        vec![Call::SetApproval {
            class: AssetClass::NftRwlk,
            operator: rwlk_staking_wallet()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn submit_selected__staked_positions__batch_unstake_without_approval() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(
        AssetClass::NftRwlk,
        Listing::Staked,
        vec![
            AssetRef::indexed(AssetClass::NftRwlk, 70).settled(true),
            AssetRef::indexed(AssetClass::NftRwlk, 71).settled(true),
        ],
    );
    let contracts = FakeContracts::linked_to(&index);
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftRwlk, Operation::Unstake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(!desk.requires_approval());
    assert_eq!(notice.severity, Severity::Success, "{notice}");
    assert_eq!(
        contracts.calls(),
        vec![
            Call::Unstake {
                class: AssetClass::NftRwlk,
                ids: vec![70, 71]
            },
            Call::WaitForConfirmation(hash(1)),
        ]
    );
}

#[tokio::test]
async fn desk__invalid_pairings_and_missing_wallet__are_rejected() {
    // given
    let index = FakeReadApi::new();
    let contracts = FakeContracts::new();
    let bare = DeskContext::new(owner(), Arc::new(index.clone()), Arc::new(contracts.clone()));
    let ctx = context(&index, &contracts);

    // when
    let donated_stake = ctx.desk(AssetClass::NftDonated, Operation::Stake).err();
    let cst_claim = ctx.desk(AssetClass::NftCst, Operation::Claim).err();
    let no_wallet = bare.desk(AssetClass::NftCst, Operation::Stake).err();
    let unstake_needs_none = bare.desk(AssetClass::NftCst, Operation::Unstake);

    // then
    assert_eq!(
        donated_stake,
        Some(ClaimError::Unsupported {
            class: AssetClass::NftDonated,
            operation: Operation::Stake
        })
    );
    assert!(matches!(cst_claim, Some(ClaimError::Unsupported { .. })));
    assert!(matches!(no_wallet, Some(ClaimError::Validation(_))));
    assert!(unstake_needs_none.is_ok());
}

#[tokio::test(start_paused = true)]
async fn submit_selected__confirmation_never_arrives__times_out_as_on_chain_failure() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([3]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.approve(AssetClass::NftCst);
    contracts.hold_next_confirmation();
    let ctx = context(&index, &contracts).with_confirmation_timeout(Some(Duration::from_secs(30)));
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(notice.is_error());
    let Phase::Failed { error } = desk.phase() else {
        panic!("expected a failed record, got {}", desk.phase());
    };
    assert_eq!(error.category(), ErrorCategory::OnChain);
    assert!(error.to_string().contains("no confirmation within"));
}

#[tokio::test(start_paused = true)]
async fn submit_selected__approval_reverts__fails_as_approval_error_without_staking() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([8]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.revert_next(Some("operator is blacklisted"));
    let ctx = context(&index, &contracts);
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(notice.is_error());
    let Phase::Failed { error } = desk.phase() else {
        panic!("expected a failed record, got {}", desk.phase());
    };
    assert_eq!(error.category(), ErrorCategory::Approval);
    assert!(error.to_string().contains("operator is blacklisted"), "{error}");
    assert_eq!(
        desk.tracker().record().unwrap().approval_hash,
        Some(hash(1))
    );
    assert_eq!(
        contracts.writes(),
        vec![Call::SetApproval {
            class: AssetClass::NftCst,
            operator: cst_staking_wallet()
        }]
    );
    assert!(!contracts.is_approved(AssetClass::NftCst));
    assert_eq!(desk.selection().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn submit_selected__approval_visible_on_a_later_recheck__waits_then_stakes() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([12]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.lag_approval_reads(2);
    let ctx = context(&index, &contracts)
        .with_approval_rechecks(3, Duration::from_millis(500));
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();
    let started = Instant::now();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert_eq!(notice.severity, Severity::Success, "{notice}");
    assert!(started.elapsed() >= SETTLE_DELAY + Duration::from_secs(1));
    let check = Call::IsApproved {
        class: AssetClass::NftCst,
        operator: cst_staking_wallet(),
    };
    assert_eq!(
        contracts.calls(),
        vec![
            check.clone(),
            Call::SetApproval {
                class: AssetClass::NftCst,
                operator: cst_staking_wallet()
            },
            Call::WaitForConfirmation(hash(1)),
            check.clone(),
            check.clone(),
            check,
            Call::Stake {
                class: AssetClass::NftCst,
                ids: vec![12]
            },
            Call::WaitForConfirmation(hash(2)),
        ]
    );
    assert_eq!(desk.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn submit_selected__approval_never_visible__fails_after_last_recheck() {
    // given
    let index = FakeReadApi::new();
    index.set_listing(AssetClass::NftCst, Listing::Unstaked, cst([13]));
    let contracts = FakeContracts::linked_to(&index);
    contracts.lag_approval_reads(5);
    let ctx = context(&index, &contracts)
        .with_approval_rechecks(2, Duration::from_millis(500));
    let desk = ctx.desk(AssetClass::NftCst, Operation::Stake).unwrap();
    desk.refresh().await;
    desk.select_all();
    let started = Instant::now();

    // when
    let notice = desk.submit_selected().await;

    // then
    assert!(notice.is_error());
    assert!(started.elapsed() >= Duration::from_millis(500));
    let Phase::Failed { error } = desk.phase() else {
        panic!("expected a failed record, got {}", desk.phase());
    };
    assert_eq!(error.category(), ErrorCategory::Approval);
    assert!(error.to_string().contains("still not authorized"), "{error}");
    let checks = contracts
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::IsApproved { .. }))
        .count();
    assert_eq!(checks, 3);
    assert!(
        !contracts
            .writes()
            .iter()
            .any(|call| matches!(call, Call::Stake { .. }))
    );
}
