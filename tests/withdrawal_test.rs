mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{earn, onboard, single_threshold, test_service, test_service_with, DEPOSIT};
use uuid::Uuid;
use vendor_wallet::application::AppError;
use vendor_wallet::domain::EntryStatus;

#[tokio::test]
async fn test_submit_and_approve() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 100_000).await?;

    let request = service.submit_withdrawal("v1", 40_000).await?;
    assert_eq!(request.amount, 40_000);
    assert_eq!(request.status, EntryStatus::Pending);
    assert!(request.resolved_at.is_none());

    // The pending amount is reserved immediately
    let summary = service.wallet_summary("v1").await?;
    assert_eq!(summary.current_balance, DEPOSIT + 60_000);
    assert_eq!(summary.pending_withdrawal, 40_000);
    assert_eq!(summary.withdrawable_amount, 60_000);

    let approved = service.approve_withdrawal(request.id).await?;
    assert_eq!(approved.status, EntryStatus::Approved);
    assert!(approved.resolved_at.is_some());

    let summary = service.wallet_summary("v1").await?;
    assert_eq!(summary.current_balance, DEPOSIT + 60_000);
    assert_eq!(summary.pending_withdrawal, 0);
    assert_eq!(summary.total_withdrawals, 40_000);
    assert!(service.pending_withdrawal("v1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_no_double_pending_regardless_of_amount() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 100_000).await?;

    let first = service.submit_withdrawal("v1", 10_000).await?;

    for amount in [1, 10_000, 50_000_000] {
        match service.submit_withdrawal("v1", amount).await {
            Err(AppError::DuplicatePendingRequest { existing }) => {
                assert_eq!(existing.id, first.id)
            }
            other => panic!("expected duplicate pending request, got {other:?}"),
        }
    }

    assert_eq!(service.list_withdrawals("v1").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rejection_restores_balances_exactly() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 75_000).await?;

    let before = service.wallet_summary("v1").await?;
    let cached_before = service.get_wallet("v1").await?.cached_balance;

    let request = service.submit_withdrawal("v1", 75_000).await?;
    let rejected = service
        .reject_withdrawal(request.id, Some("bank details invalid".into()))
        .await?;
    assert_eq!(rejected.status, EntryStatus::Rejected);
    assert_eq!(
        rejected.resolution_note.as_deref(),
        Some("bank details invalid")
    );

    let after = service.wallet_summary("v1").await?;
    assert_eq!(after.current_balance, before.current_balance);
    assert_eq!(after.available_balance, before.available_balance);
    assert_eq!(after.withdrawable_amount, before.withdrawable_amount);
    assert_eq!(service.get_wallet("v1").await?.cached_balance, cached_before);

    // The vendor may immediately try again
    let retry = service.submit_withdrawal("v1", 75_000).await?;
    assert_eq!(retry.status, EntryStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn test_double_threshold_reports_withdrawable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 520_000).await?;

    let summary = service.wallet_summary("v1").await?;
    assert_eq!(summary.available_balance, 520_000);
    assert_eq!(summary.withdrawable_amount, 20_000);

    match service.submit_withdrawal("v1", 20_001).await {
        Err(AppError::InsufficientWithdrawableAmount {
            requested,
            withdrawable,
        }) => {
            assert_eq!(requested, 20_001);
            assert_eq!(withdrawable, 20_000);
        }
        other => panic!("expected insufficient withdrawable, got {other:?}"),
    }
    assert!(service.pending_withdrawal("v1").await?.is_none());

    service.submit_withdrawal("v1", 20_000).await?;
    Ok(())
}

#[tokio::test]
async fn test_balance_just_above_deposit_is_not_withdrawable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 30_000).await?;

    let summary = service.wallet_summary("v1").await?;
    assert_eq!(summary.available_balance, 30_000);
    assert_eq!(summary.withdrawable_amount, 0);

    let result = service.submit_withdrawal("v1", 1).await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientWithdrawableAmount { withdrawable: 0, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_resolved_requests_are_terminal() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 50_000).await?;

    let request = service.submit_withdrawal("v1", 10_000).await?;
    service.approve_withdrawal(request.id).await?;

    assert!(matches!(
        service.approve_withdrawal(request.id).await,
        Err(AppError::InvalidTransition {
            from: EntryStatus::Approved,
            to: EntryStatus::Approved,
            ..
        })
    ));
    assert!(matches!(
        service.reject_withdrawal(request.id, None).await,
        Err(AppError::InvalidTransition {
            from: EntryStatus::Approved,
            to: EntryStatus::Rejected,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_resolving_unknown_or_non_request_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    onboard(&service, "v1").await?;

    assert!(matches!(
        service.approve_withdrawal(Uuid::new_v4()).await,
        Err(AppError::EntryNotFound(_))
    ));

    let penalty = service.record_penalty("v1", 100, None, None).await?;
    assert!(matches!(
        service.approve_withdrawal(penalty.id).await,
        Err(AppError::EntryNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_invalid_submissions_write_nothing() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;

    assert!(matches!(
        service.submit_withdrawal("v1", 0).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        service.submit_withdrawal("v1", -500).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        service.submit_withdrawal("ghost", 500).await,
        Err(AppError::WalletNotFound(_))
    ));
    assert!(service.list_withdrawals("v1").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_submissions_yield_one_pending() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 100_000).await?;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.submit_withdrawal("v1", 1_000 + i).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => accepted += 1,
            Err(AppError::DuplicatePendingRequest { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);

    let requests = service.list_withdrawals("v1").await?;
    assert_eq!(requests.len(), 1);
    assert_eq!(service.check_integrity().await?.vendors_with_multiple_pending, 0);
    Ok(())
}

#[tokio::test]
async fn test_withdrawals_listed_newest_first() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 100_000).await?;

    let first = service.submit_withdrawal("v1", 1_000).await?;
    service.reject_withdrawal(first.id, None).await?;
    let second = service.submit_withdrawal("v1", 2_000).await?;

    let requests = service.list_withdrawals("v1").await?;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].id, second.id);
    assert_eq!(requests[1].id, first.id);
    assert_eq!(
        service.pending_withdrawal("v1").await?.map(|r| r.id),
        Some(second.id)
    );
    Ok(())
}
