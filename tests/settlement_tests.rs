use common::charge;
use ledgerpay::application::batch::FailurePolicy;
use ledgerpay::application::orchestrator::{PaymentOrchestrator, SettlementConfig};
use ledgerpay::domain::charge::{Charge, UserId};
use ledgerpay::domain::ports::{ChargeSourceBox, GatewayError, PaymentGatewayRef};
use ledgerpay::error::LedgerError;
use ledgerpay::infrastructure::in_memory::InMemoryChargeSource;
use ledgerpay::infrastructure::simulated_gateway::SimulatedGateway;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

mod common;

/// One charge per building, all due at `due_at`, billed to `user-<n>`.
fn one_charge_per_building(count: usize, due_at: i64) -> Vec<Charge> {
    (0..count)
        .map(|i| {
            charge(
                &format!("c{i}"),
                &format!("bldg-{i}"),
                &format!("user-{i}"),
                Decimal::from(i as u64 + 1),
                due_at,
            )
        })
        .collect()
}

fn orchestrator(charges: Vec<Charge>, gateway: &SimulatedGateway) -> PaymentOrchestrator {
    let source: ChargeSourceBox = Box::new(InMemoryChargeSource::from(charges));
    let gateway: PaymentGatewayRef = Arc::new(gateway.clone());
    PaymentOrchestrator::new(source, gateway)
}

#[tokio::test]
async fn test_settlement_respects_gateway_ceiling() {
    let gateway = SimulatedGateway::default().with_latency(Duration::from_millis(10));
    let orchestrator = orchestrator(one_charge_per_building(12, 100), &gateway);

    orchestrator.settle_due_payments(100).await.unwrap();

    assert_eq!(gateway.receipts().await.len(), 12);
}

#[tokio::test]
async fn test_settlement_above_gateway_ceiling_fails() {
    let gateway = SimulatedGateway::default().with_latency(Duration::from_millis(10));
    let orchestrator = orchestrator(one_charge_per_building(12, 100), &gateway).with_config(
        SettlementConfig {
            concurrency: 6,
            policy: FailurePolicy::FailFast,
        },
    );

    let error = orchestrator.settle_due_payments(100).await.unwrap_err();

    match error {
        LedgerError::JobFailure { index, source } => {
            assert_eq!(index, 5);
            assert!(matches!(
                source.downcast_ref::<GatewayError>(),
                Some(GatewayError::ConcurrencyExceeded { limit: 5 })
            ));
        }
        other => panic!("expected JobFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_declined_payment_stops_later_waves() {
    let gateway = SimulatedGateway::default()
        .with_latency(Duration::from_millis(10))
        .with_declined_users([UserId::new("user-1")]);
    let orchestrator = orchestrator(one_charge_per_building(8, 100), &gateway);

    let error = orchestrator.settle_due_payments(100).await.unwrap_err();
    assert_eq!(error.job_index(), Some(1));

    // The rest of the first wave still completes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut paid: Vec<String> = gateway
        .receipts()
        .await
        .into_iter()
        .map(|r| r.user_id.to_string())
        .collect();
    paid.sort();
    assert_eq!(paid, vec!["user-0", "user-2", "user-3", "user-4"]);
}

#[test]
fn test_payments_in_flight_survive_runtime_shutdown() {
    let gateway = SimulatedGateway::default().with_latency(Duration::from_millis(50));
    let orchestrator = orchestrator(one_charge_per_building(6, 100), &gateway).with_config(
        SettlementConfig {
            concurrency: 6,
            policy: FailurePolicy::FailFast,
        },
    );

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let settled = runtime.block_on(orchestrator.settle_due_payments(100));
    runtime.block_on(orchestrator.wait_for_in_flight());
    drop(runtime);

    assert_eq!(settled.unwrap_err().job_index(), Some(5));
    let receipts = tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(gateway.receipts());
    assert_eq!(receipts.len(), 5);
}

#[tokio::test]
async fn test_collect_all_settles_every_other_item() {
    let gateway = SimulatedGateway::default().with_declined_users([UserId::new("user-1")]);
    let orchestrator = orchestrator(one_charge_per_building(8, 100), &gateway).with_config(
        SettlementConfig {
            concurrency: 5,
            policy: FailurePolicy::CollectAll,
        },
    );

    let error = orchestrator.settle_due_payments(100).await.unwrap_err();

    assert!(matches!(
        error,
        LedgerError::PartialFailure { total: 8, ref failures } if failures.len() == 1
    ));
    assert_eq!(gateway.receipts().await.len(), 7);
}

#[tokio::test]
async fn test_only_due_charges_are_settled() {
    let gateway = SimulatedGateway::default();
    let orchestrator = orchestrator(
        vec![
            charge("1", "A", "u1", dec!(10), 100),
            charge("2", "A", "u1", dec!(15), 100),
            charge("3", "B", "u2", dec!(7), 150),
            charge("4", "C", "u3", dec!(99), 151),
        ],
        &gateway,
    );

    orchestrator.settle_due_payments(150).await.unwrap();

    let mut paid: Vec<(String, Decimal)> = gateway
        .receipts()
        .await
        .into_iter()
        .map(|r| (r.user_id.to_string(), r.amount.value()))
        .collect();
    paid.sort();
    assert_eq!(
        paid,
        vec![("u1".to_string(), dec!(25)), ("u2".to_string(), dec!(7))]
    );
}

#[tokio::test]
async fn test_item_spanning_users_bills_first_user() {
    let gateway = SimulatedGateway::default();
    let orchestrator = orchestrator(
        vec![
            charge("1", "A", "tenant-b", dec!(40), 100),
            charge("2", "A", "tenant-a", dec!(60), 100),
        ],
        &gateway,
    );

    orchestrator.settle_due_payments(100).await.unwrap();

    let receipts = gateway.receipts().await;
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].user_id.as_str(), "tenant-b");
    assert_eq!(receipts[0].amount.value(), dec!(100));
}

#[tokio::test]
async fn test_rerun_settles_same_charges_again() {
    let gateway = SimulatedGateway::default();
    let orchestrator = orchestrator(one_charge_per_building(3, 100), &gateway);

    orchestrator.settle_due_payments(100).await.unwrap();
    orchestrator.settle_due_payments(100).await.unwrap();

    assert_eq!(gateway.receipts().await.len(), 6);
}

#[tokio::test]
async fn test_orchestrator_is_send_across_tasks() {
    let gateway = SimulatedGateway::default();
    let orchestrator = orchestrator(one_charge_per_building(2, 100), &gateway);

    let handle = tokio::spawn(async move { orchestrator.settle_due_payments(100).await });

    handle.await.unwrap().unwrap();
    assert_eq!(gateway.receipts().await.len(), 2);
}
