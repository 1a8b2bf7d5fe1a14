mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{FakeGateway, line, service};
use salon::completion::{CompletionCheck, CompletionError, CompletionWorkflow, EarningsOutcome};
use salon::model::service::ServiceStatus;
use salon::realtime::{BusEvent, EventBus};

fn workflow(gateway: &Arc<FakeGateway>, bus: &EventBus) -> CompletionWorkflow {
    CompletionWorkflow::new(gateway.clone(), bus.clone())
}

#[tokio::test]
async fn shortage_blocks_until_restocked() {
    let gateway = Arc::new(FakeGateway::new(
        service(1, Some(3), Some(25.0)),
        vec![line(10, 2, 8), line(11, 5, 2)],
    ));
    let bus = EventBus::default();
    let flow = workflow(&gateway, &bus);

    let check = flow.check(1).await.unwrap();
    assert!(!check.can_complete());
    let CompletionCheck::Items { report } = check else {
        panic!("service has inventory lines");
    };
    let shortages = report.shortages();
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].item_id, 11);
    assert_eq!(shortages[0].shortage, 3);

    let refused = flow.confirm(1).await.unwrap_err();
    assert!(matches!(refused, CompletionError::InsufficientStock(ref s) if s.len() == 1));
    assert_eq!(gateway.completions.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.status().as_deref(), Some("in_progress"));

    gateway.restock(11, 5);
    let outcome = flow.confirm(1).await.unwrap();
    assert_eq!(outcome.deducted_items, vec![10, 11]);
    assert_eq!(gateway.status(), Some(ServiceStatus::Completed.to_string()));
}

#[tokio::test]
async fn commission_is_recorded_for_the_worker() {
    let gateway = Arc::new(FakeGateway::new(
        service(2, Some(3), Some(25.0)),
        vec![line(10, 1, 4)],
    ));
    let bus = EventBus::default();
    let mut rx = bus.subscribe();

    let outcome = workflow(&gateway, &bus).confirm(2).await.unwrap();

    assert_eq!(
        outcome.earnings,
        EarningsOutcome::Recorded {
            worker_id: 3,
            amount: 50.0
        }
    );
    assert_eq!(*gateway.earnings.lock().unwrap(), vec![(3, 2, 25.0, 50.0)]);

    match rx.try_recv().unwrap() {
        BusEvent::InventoryDataChanged {
            service_id,
            item_ids,
        } => {
            assert_eq!(service_id, Some(2));
            assert_eq!(item_ids, vec![10]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn earnings_failure_does_not_undo_completion() {
    let gateway = Arc::new(FakeGateway::new(
        service(3, Some(9), Some(40.0)),
        vec![line(10, 1, 1)],
    ));
    gateway.fail_earnings.store(true, Ordering::SeqCst);

    let outcome = workflow(&gateway, &EventBus::default())
        .confirm(3)
        .await
        .unwrap();

    assert!(matches!(outcome.earnings, EarningsOutcome::Failed { .. }));
    assert_eq!(gateway.completions.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.status(), Some(ServiceStatus::Completed.to_string()));
    assert_eq!(gateway.lines.lock().unwrap()[0].available_stock, 0);
}

#[tokio::test]
async fn service_without_items_completes_directly() {
    let gateway = Arc::new(FakeGateway::new(service(4, None, None), Vec::new()));
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let flow = workflow(&gateway, &bus);

    assert_eq!(flow.check(4).await.unwrap(), CompletionCheck::NoItems);

    let outcome = flow.confirm(4).await.unwrap();
    assert!(outcome.deducted_items.is_empty());
    assert_eq!(outcome.earnings, EarningsOutcome::Skipped);
    // nothing was deducted, so no inventory event
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn completed_service_cannot_complete_again() {
    let gateway = Arc::new(FakeGateway::new(service(5, None, None), vec![line(10, 1, 5)]));
    let flow = workflow(&gateway, &EventBus::default());

    flow.confirm(5).await.unwrap();
    let err = flow.confirm(5).await.unwrap_err();

    assert!(matches!(err, CompletionError::InvalidStatus(5, ref status) if status == "completed"));
    assert_eq!(gateway.completions.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.lines.lock().unwrap()[0].available_stock, 4);
}

#[tokio::test]
async fn cancelled_service_is_refused() {
    let mut cancelled = service(6, None, None);
    cancelled.status = ServiceStatus::Cancelled.to_string();
    let gateway = Arc::new(FakeGateway::new(cancelled, Vec::new()));

    let err = workflow(&gateway, &EventBus::default())
        .confirm(6)
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::InvalidStatus(..)));
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let gateway = Arc::new(FakeGateway::new(service(7, None, None), Vec::new()));
    let err = workflow(&gateway, &EventBus::default())
        .confirm(99)
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::NotFound(99)));
}

#[tokio::test]
async fn stock_taken_after_the_check_is_refused_at_deduction() {
    let gateway = Arc::new(FakeGateway::new(
        service(8, Some(3), Some(25.0)),
        vec![line(10, 4, 5)],
    ));
    let flow = workflow(&gateway, &EventBus::default());
    assert!(flow.check(8).await.unwrap().can_complete());

    // another service completes first and leaves one unit
    gateway.sell_before_deduction(10, 1);
    let err = flow.confirm(8).await.unwrap_err();

    let CompletionError::InsufficientStock(shortages) = err else {
        panic!("expected a shortage");
    };
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].shortage, 3);
    assert_eq!(gateway.completions.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.status().as_deref(), Some("in_progress"));
    assert!(gateway.earnings.lock().unwrap().is_empty());
    assert_eq!(gateway.lines.lock().unwrap()[0].available_stock, 1);
}
