//! Transaction model

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{amount, RecordId, UserId};
use crate::resource::{recency_then_id, Draft, OrderBy, Resource};

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Income => "income",
            Self::Expense => "expense",
        })
    }
}

impl FromStr for TransactionKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(crate::Error::Validation(format!(
                "unknown transaction type '{other}'"
            ))),
        }
    }
}

/// A recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: RecordId,
    pub user_id: UserId,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with its sign applied: income positive, expense negative.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// Writable fields of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub date: NaiveDate,
}

impl NewTransaction {
    /// Expense dated today, the default of a fresh form.
    pub fn expense(amount: f64) -> Self {
        Self {
            amount,
            description: None,
            category: None,
            kind: TransactionKind::Expense,
            date: crate::util::today(),
        }
    }

    /// Copy the editable fields of an existing row.
    pub fn from_existing(transaction: &Transaction) -> Self {
        Self {
            amount: transaction.amount,
            description: transaction.description.clone(),
            category: transaction.category.clone(),
            kind: transaction.kind,
            date: transaction.date,
        }
    }
}

impl Draft for NewTransaction {
    fn validate(&self) -> crate::Result<()> {
        amount::validate(self.amount)
    }
}

/// Income/expense totals over a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub count: usize,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

impl Resource for Transaction {
    const TABLE: &'static str = "transactions";
    const ORDER: OrderBy = OrderBy::descending("date");

    type Draft = NewTransaction;
    type Summary = TransactionSummary;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn owner(&self) -> &UserId {
        &self.user_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn display_order(a: &Self, b: &Self) -> Ordering {
        b.date.cmp(&a.date).then_with(|| recency_then_id(a, b))
    }

    fn summarize(records: &[Self]) -> TransactionSummary {
        let sum_of = |kind| {
            records
                .iter()
                .filter(|transaction| transaction.kind == kind)
                .map(|transaction| transaction.amount)
                .sum::<f64>()
        };
        let total_income = sum_of(TransactionKind::Income);
        let total_expense = sum_of(TransactionKind::Expense);

        TransactionSummary {
            count: records.len(),
            total_income,
            total_expense,
            balance: total_income - total_expense,
        }
    }

    fn from_draft(id: RecordId, owner: UserId, created_at: DateTime<Utc>, draft: NewTransaction) -> Self {
        Self {
            id,
            user_id: owner,
            amount: draft.amount,
            description: draft.description,
            category: draft.category,
            kind: draft.kind,
            date: draft.date,
            created_at,
        }
    }
}
