//! Per-resource controllers and the registry that hands them out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use tokio::sync::Mutex;

use crate::models::{Budget, Category, RecordId, Transaction, UserId};
use crate::remote::{ChangeFeed, Mutation, RemoteTable};
use crate::resource::Resource;
use crate::store::{RemoteCollectionStore, StoreError, StoreUpdate};
use crate::sync::SubscriptionStatus;

/// Explicit acknowledgment that a record may be deleted.
///
/// Deletion through a controller requires one of these, so callers must make
/// a deliberate choice (a prompt, a `--yes` flag) before anything is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    id: RecordId,
}

impl DeleteConfirmation {
    pub const fn confirm(id: RecordId) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> &RecordId {
        &self.id
    }
}

/// One resource view: a live store plus aggregates derived from it.
pub struct ResourceController<R: Resource, B> {
    store: RemoteCollectionStore<R, B>,
}

pub type TransactionController<B> = ResourceController<Transaction, B>;
pub type CategoryController<B> = ResourceController<Category, B>;
pub type BudgetController<B> = ResourceController<Budget, B>;

impl<R: Resource, B: RemoteTable + ChangeFeed> ResourceController<R, B> {
    pub fn new(backend: B, owner: UserId) -> Self {
        Self {
            store: RemoteCollectionStore::new(backend, owner),
        }
    }

    /// Load the snapshot and open the change channel.
    ///
    /// The channel is opened even when the load fails so later writes still
    /// show up; the load error is returned for display.
    pub async fn start(&mut self) -> Result<SubscriptionStatus, StoreError> {
        let loaded = self.store.initialize().await.map(|_| ());
        let status = self.store.subscribe().await;
        loaded.map(|()| status)
    }

    pub const fn store(&self) -> &RemoteCollectionStore<R, B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RemoteCollectionStore<R, B> {
        &mut self.store
    }

    pub fn records(&self) -> &[R] {
        self.store.snapshot()
    }

    /// Aggregates over the current snapshot, computed fresh on each call.
    pub fn summary(&self) -> R::Summary {
        R::summarize(self.store.snapshot())
    }

    pub async fn create(&self, draft: R::Draft) -> Result<R, StoreError> {
        self.store.mutate(Mutation::Create(draft)).await
    }

    pub async fn update(&self, id: RecordId, draft: R::Draft) -> Result<R, StoreError> {
        self.store.mutate(Mutation::Update(id, draft)).await
    }

    pub async fn delete(&self, confirmation: DeleteConfirmation) -> Result<R, StoreError> {
        self.store.mutate(Mutation::Delete(confirmation.id)).await
    }

    pub async fn next_update(&mut self) -> Option<StoreUpdate<R>> {
        self.store.next_update().await
    }

    pub fn drain_pending(&mut self) -> Vec<StoreUpdate<R>> {
        self.store.drain_pending()
    }

    pub fn teardown(&mut self) {
        self.store.teardown();
    }
}

pub type SharedController<R, B> = Arc<Mutex<ResourceController<R, B>>>;

/// Hands out at most one live controller per owner for resource `R`.
///
/// The registry keeps weak references only: once every caller drops its
/// controller the subscription closes, and the next `acquire` builds a fresh
/// one.
pub struct ControllerRegistry<R: Resource, B> {
    backend: B,
    active: StdMutex<HashMap<UserId, Weak<Mutex<ResourceController<R, B>>>>>,
}

impl<R: Resource, B: RemoteTable + ChangeFeed + Clone> ControllerRegistry<R, B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: StdMutex::new(HashMap::new()),
        }
    }

    /// The live controller for `owner`, or a new unstarted one.
    pub fn acquire(&self, owner: &UserId) -> SharedController<R, B> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.retain(|_, controller| controller.strong_count() > 0);

        if let Some(existing) = active.get(owner).and_then(Weak::upgrade) {
            tracing::debug!("Reusing {} controller for {}", R::TABLE, owner);
            return existing;
        }

        let controller = Arc::new(Mutex::new(ResourceController::new(
            self.backend.clone(),
            owner.clone(),
        )));
        active.insert(owner.clone(), Arc::downgrade(&controller));
        tracing::debug!("Created {} controller for {}", R::TABLE, owner);
        controller
    }

    /// Owners with a controller still alive.
    pub fn active_count(&self) -> usize {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .values()
            .filter(|controller| controller.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{
        BudgetPeriod, CategoryKind, NewCategory, NewTransaction, TransactionKind,
        TransactionSummary,
    };
    use crate::remote::MemoryBackend;
    use crate::sync::ChangeEvent;

    fn owner() -> UserId {
        UserId::new("user-1")
    }

    fn created() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn transaction(id: u64, kind: TransactionKind, amount: f64) -> Transaction {
        Transaction {
            id: RecordId::from(id),
            user_id: owner(),
            amount,
            description: None,
            category: Some("General".to_string()),
            kind,
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            created_at: created(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn start_loads_and_subscribes() {
        let backend = MemoryBackend::new();
        backend
            .seed(&transaction(1, TransactionKind::Income, 100.0))
            .unwrap();
        let mut controller = TransactionController::new(backend.clone(), owner());

        let status = controller.start().await.unwrap();
        assert_eq!(status, SubscriptionStatus::Subscribed);
        assert_eq!(controller.records().len(), 1);
        assert_eq!(backend.open_channels(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn start_subscribes_even_when_load_fails() {
        let backend = MemoryBackend::new();
        backend.fail_next_queries(1);
        let mut controller = TransactionController::new(backend.clone(), owner());

        assert!(matches!(
            controller.start().await,
            Err(StoreError::Load { .. })
        ));
        assert!(controller.store().has_open_subscription());
        assert_eq!(controller.summary(), TransactionSummary::default());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn summary_follows_applied_events() {
        let backend = MemoryBackend::new();
        let mut controller = TransactionController::new(backend, owner());
        controller.start().await.unwrap();

        let store = controller.store_mut();
        store.apply_event(ChangeEvent::Inserted(transaction(1, TransactionKind::Income, 250.0)));
        store.apply_event(ChangeEvent::Inserted(transaction(2, TransactionKind::Expense, 75.5)));
        store.apply_event(ChangeEvent::Inserted(transaction(3, TransactionKind::Expense, 24.5)));

        let summary = controller.summary();
        assert_eq!(summary.total_income, 250.0);
        assert_eq!(summary.total_expense, 100.0);
        assert_eq!(summary.balance, summary.total_income - summary.total_expense);
        assert_eq!(controller.summary(), summary);

        controller
            .store_mut()
            .apply_event(ChangeEvent::Removed(RecordId::from(1)));
        assert_eq!(controller.summary().balance, -100.0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn create_appears_after_echo() {
        let backend = MemoryBackend::new();
        let mut controller = CategoryController::new(backend, owner());
        controller.start().await.unwrap();

        let mut draft = NewCategory::new("Salary");
        draft.kind = CategoryKind::Both;
        controller.create(draft).await.unwrap();
        assert!(controller.records().is_empty());

        controller.drain_pending();
        let summary = controller.summary();
        assert_eq!(summary.total_categories, 1);
        assert_eq!(summary.income_count, 1);
        assert_eq!(summary.expense_count, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_requires_confirmation_token() {
        let backend = MemoryBackend::new();
        let mut controller = TransactionController::new(backend, owner());
        controller.start().await.unwrap();

        let created = controller
            .create(NewTransaction::expense(15.0))
            .await
            .unwrap();
        controller.drain_pending();
        assert_eq!(controller.records().len(), 1);

        let confirmation = DeleteConfirmation::confirm(created.id.clone());
        assert_eq!(confirmation.id(), &created.id);
        controller.delete(confirmation).await.unwrap();
        controller.drain_pending();
        assert!(controller.records().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn budgets_count_open_and_future_end_dates_as_active() {
        let backend = MemoryBackend::new();
        for (id, end) in [(1, None), (2, Some("2099-01-01")), (3, Some("2000-01-01"))] {
            backend
                .seed(&Budget {
                    id: RecordId::from(id),
                    user_id: owner(),
                    category: "Food".to_string(),
                    amount: 100.0,
                    period: BudgetPeriod::Monthly,
                    start_date: NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(),
                    end_date: end.map(|day: &str| day.parse().unwrap()),
                    created_at: created(),
                })
                .unwrap();
        }
        let mut controller = BudgetController::new(backend, owner());
        controller.start().await.unwrap();

        let summary = controller.summary();
        assert_eq!(summary.total_budgets, 3);
        assert_eq!(summary.total_amount, 300.0);
        assert_eq!(summary.active_count, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn registry_reuses_live_controller() {
        let backend = MemoryBackend::new();
        let registry = ControllerRegistry::<Transaction, _>::new(backend.clone());

        let first = registry.acquire(&owner());
        first.lock().await.start().await.unwrap();
        let second = registry.acquire(&owner());
        second.lock().await.start().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.channels_opened(), 1);
        assert_eq!(registry.active_count(), 1);

        let other = registry.acquire(&UserId::new("user-2"));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.active_count(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn registry_rebuilds_after_last_owner_drops() {
        let backend = MemoryBackend::new();
        let registry = ControllerRegistry::<Transaction, _>::new(backend.clone());

        let first = registry.acquire(&owner());
        first.lock().await.start().await.unwrap();
        drop(first);
        assert_eq!(backend.open_channels(), 0);
        assert_eq!(registry.active_count(), 0);

        let again = registry.acquire(&owner());
        assert!(!again.lock().await.store().is_initialized());
    }
}
