use fintrack_core::{
    Budget, BudgetController, Category, CategoryController, ChangeFeed, RemoteTable,
    StoreUpdate, Transaction, TransactionController, UserId,
};
use serde::Serialize;

use crate::cli::ResourceKind;
use crate::commands::records::CliRecord;
use crate::error::CliError;

/// Record counts per resource, as shown on the overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub transactions: usize,
    pub categories: usize,
    pub budgets: usize,
}

/// Live view over all three resources of one user.
pub struct Dashboard<B: RemoteTable + ChangeFeed> {
    transactions: TransactionController<B>,
    categories: CategoryController<B>,
    budgets: BudgetController<B>,
    live: [bool; 3],
}

impl<B: RemoteTable + ChangeFeed + Clone> Dashboard<B> {
    /// Start a controller per resource. Load failures are reported and the
    /// affected resource shows as empty.
    pub async fn start(backend: B, owner: UserId) -> Self {
        let mut transactions = TransactionController::new(backend.clone(), owner.clone());
        let mut categories = CategoryController::new(backend.clone(), owner.clone());
        let mut budgets = BudgetController::new(backend, owner);

        for (label, started) in [
            ("transactions", transactions.start().await),
            ("categories", categories.start().await),
            ("budgets", budgets.start().await),
        ] {
            if let Err(error) = started {
                eprintln!("Warning: {label}: {error}");
            }
        }

        Self {
            transactions,
            categories,
            budgets,
            live: [true; 3],
        }
    }
}

impl<B: RemoteTable + ChangeFeed> Dashboard<B> {
    pub fn counts(&self) -> DashboardCounts {
        DashboardCounts {
            transactions: self.transactions.records().len(),
            categories: self.categories.records().len(),
            budgets: self.budgets.records().len(),
        }
    }

    pub fn render(&self) -> Vec<String> {
        let counts = self.counts();
        let mut lines = vec![format!(
            "Transactions: {}  Categories: {}  Budgets: {}",
            counts.transactions, counts.categories, counts.budgets
        )];
        lines.push(String::new());
        lines.extend(Transaction::summary_lines(&self.transactions.summary()));
        lines.push(String::new());
        lines.extend(Category::summary_lines(&self.categories.summary()));
        lines.push(String::new());
        lines.extend(Budget::summary_lines(&self.budgets.summary()));
        lines
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "counts": self.counts(),
            "transactions": self.transactions.summary(),
            "categories": self.categories.summary(),
            "budgets": self.budgets.summary(),
        }))?)
    }

    /// Wait for the next applied change on any feed.
    ///
    /// Status and redelivery noise is skipped. Returns `None` once every feed
    /// has ended.
    pub async fn next_change(&mut self) -> Option<ResourceKind> {
        loop {
            let [tx_live, cat_live, budget_live] = self.live;
            let (kind, changed) = tokio::select! {
                update = self.transactions.next_update(), if tx_live => {
                    (ResourceKind::Transactions, update.map(|update| is_change(&update)))
                }
                update = self.categories.next_update(), if cat_live => {
                    (ResourceKind::Categories, update.map(|update| is_change(&update)))
                }
                update = self.budgets.next_update(), if budget_live => {
                    (ResourceKind::Budgets, update.map(|update| is_change(&update)))
                }
                else => return None,
            };

            match changed {
                Some(true) => return Some(kind),
                Some(false) => {}
                None => {
                    tracing::info!("Live updates for {:?} ended", kind);
                    self.live[slot(kind)] = false;
                }
            }
        }
    }

    pub fn teardown(&mut self) {
        self.transactions.teardown();
        self.categories.teardown();
        self.budgets.teardown();
        self.live = [false; 3];
    }
}

const fn slot(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Transactions => 0,
        ResourceKind::Categories => 1,
        ResourceKind::Budgets => 2,
    }
}

fn is_change<R>(update: &StoreUpdate<R>) -> bool {
    matches!(update, StoreUpdate::Changed(_))
}

pub async fn run_dashboard<B>(
    backend: B,
    owner: UserId,
    watch: bool,
    as_json: bool,
) -> Result<(), CliError>
where
    B: RemoteTable + ChangeFeed + Clone,
{
    let mut dashboard = Dashboard::start(backend, owner).await;
    print_dashboard(&dashboard, as_json)?;

    if watch {
        eprintln!("Watching all resources, press Ctrl-C to stop");
        loop {
            tokio::select! {
                changed = dashboard.next_change() => {
                    let Some(kind) = changed else {
                        eprintln!("Live updates ended");
                        break;
                    };
                    tracing::debug!("{:?} changed", kind);
                    if !as_json {
                        println!();
                    }
                    print_dashboard(&dashboard, as_json)?;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
    }

    dashboard.teardown();
    Ok(())
}

fn print_dashboard<B: RemoteTable + ChangeFeed>(
    dashboard: &Dashboard<B>,
    as_json: bool,
) -> Result<(), CliError> {
    if as_json {
        println!("{}", dashboard.to_json()?);
    } else {
        for line in dashboard.render() {
            println!("{line}");
        }
    }
    Ok(())
}
