//! Data models for fintrack

pub(crate) mod amount;
mod budget;
mod category;
mod ids;
mod transaction;

pub use budget::{Budget, BudgetPeriod, BudgetSummary, NewBudget};
pub use category::{Category, CategoryKind, CategorySummary, NewCategory, DEFAULT_CATEGORY_COLOR};
pub use ids::{RecordId, UserId};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionSummary};
