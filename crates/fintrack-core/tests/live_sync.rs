//! End-to-end behavior of controllers sharing one backend.

use chrono::NaiveDate;
use fintrack_core::models::{NewBudget, NewTransaction, TransactionKind};
use fintrack_core::sync::RawChange;
use fintrack_core::{
    BudgetController, ChangeEvent, DeleteConfirmation, MemoryBackend, RecordId, Resource,
    StoreUpdate, SubscriptionStatus, Transaction, TransactionController, UserId,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn day(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

fn draft(amount: f64, kind: TransactionKind, date: &str) -> NewTransaction {
    NewTransaction {
        amount,
        description: None,
        category: Some("General".to_string()),
        kind,
        date: day(date),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn writes_from_one_session_reach_the_other() {
    let backend = MemoryBackend::new();
    let owner = UserId::new("user-1");

    let mut phone = TransactionController::new(backend.clone(), owner.clone());
    let mut laptop = TransactionController::new(backend.clone(), owner.clone());
    phone.start().await.unwrap();
    laptop.start().await.unwrap();

    let salary = phone
        .create(draft(2000.0, TransactionKind::Income, "2024-01-01"))
        .await
        .unwrap();
    laptop
        .create(draft(45.0, TransactionKind::Expense, "2024-01-15"))
        .await
        .unwrap();

    phone.drain_pending();
    laptop.drain_pending();
    assert_eq!(phone.records(), laptop.records());
    assert_eq!(phone.records()[1].id, salary.id);

    let mut edited = NewTransaction::from_existing(&salary);
    edited.amount = 2100.0;
    laptop.update(salary.id.clone(), edited).await.unwrap();
    let update = phone.next_update().await.unwrap();
    assert!(matches!(update, StoreUpdate::Changed(ChangeEvent::Updated(_))));

    let summary = phone.summary();
    assert_eq!(summary.total_income, 2100.0);
    assert_eq!(summary.total_expense, 45.0);
    assert_eq!(summary.balance, 2055.0);

    phone
        .delete(DeleteConfirmation::confirm(salary.id.clone()))
        .await
        .unwrap();
    laptop.drain_pending();
    assert_eq!(laptop.records().len(), 1);
    assert_eq!(laptop.summary().balance, -45.0);
}

#[tokio::test(flavor = "current_thread")]
async fn owners_never_see_each_others_changes() {
    let backend = MemoryBackend::new();
    let mut alice = TransactionController::new(backend.clone(), UserId::new("alice"));
    let mut bob = TransactionController::new(backend.clone(), UserId::new("bob"));
    alice.start().await.unwrap();
    bob.start().await.unwrap();

    alice
        .create(draft(10.0, TransactionKind::Expense, "2024-02-01"))
        .await
        .unwrap();

    alice.drain_pending();
    assert!(bob.drain_pending().is_empty());
    assert_eq!(alice.records().len(), 1);
    assert!(bob.records().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn redelivery_and_malformed_payloads_leave_snapshot_consistent() {
    let backend = MemoryBackend::new();
    let owner = UserId::new("user-1");
    let mut view = TransactionController::new(backend.clone(), owner.clone());
    view.start().await.unwrap();

    let row = json!({
        "id": 7,
        "user_id": "user-1",
        "amount": "12.50",
        "description": "Lunch",
        "category": "Food",
        "type": "expense",
        "date": "2024-03-02",
        "created_at": "2024-03-02T12:00:00Z"
    });
    backend.emit(Transaction::TABLE, &owner, &RawChange::insert(row.clone()));
    backend.emit(Transaction::TABLE, &owner, &RawChange::insert(row.clone()));
    backend.emit(Transaction::TABLE, &owner, &RawChange::update(row));
    backend.emit(
        Transaction::TABLE,
        &owner,
        &RawChange::update(json!({"user_id": "user-1", "amount": 3})),
    );
    backend.emit(
        Transaction::TABLE,
        &owner,
        &RawChange::delete(&RecordId::from(99)),
    );

    let updates = view.drain_pending();
    let changed = updates
        .iter()
        .filter(|update| matches!(update, StoreUpdate::Changed(_)))
        .count();
    let dropped = updates
        .iter()
        .filter(|update| matches!(update, StoreUpdate::Dropped(_)))
        .count();
    assert_eq!(updates.len(), 5);
    assert_eq!(changed, 1);
    assert_eq!(dropped, 1);
    assert_eq!(view.records().len(), 1);
    assert_eq!(view.records()[0].amount, 12.5);
}

#[tokio::test(flavor = "current_thread")]
async fn teardown_closes_every_channel() {
    let backend = MemoryBackend::new();
    let owner = UserId::new("user-1");
    let mut transactions = TransactionController::new(backend.clone(), owner.clone());
    let mut budgets = BudgetController::new(backend.clone(), owner.clone());
    transactions.start().await.unwrap();
    budgets.start().await.unwrap();
    assert_eq!(backend.open_channels(), 2);

    transactions.teardown();
    budgets.teardown();
    budgets.teardown();
    assert_eq!(backend.open_channels(), 0);
    assert_eq!(
        transactions.store().subscription_status(),
        &SubscriptionStatus::Closed
    );

    let mut plan = NewBudget::monthly("Food", 300.0);
    plan.start_date = day("2024-01-01");
    budgets.create(plan).await.unwrap();
    assert!(budgets.drain_pending().is_empty());
    assert!(budgets.records().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn rejected_writes_surface_to_caller_only() {
    let backend = MemoryBackend::new();
    let mut view = TransactionController::new(backend.clone(), UserId::new("user-1"));
    view.start().await.unwrap();

    let error = view
        .create(draft(0.0, TransactionKind::Expense, "2024-01-01"))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("transactions"));
    assert!(view.store().last_error().is_none());
    assert!(view.drain_pending().is_empty());
    assert!(view.records().is_empty());
}
