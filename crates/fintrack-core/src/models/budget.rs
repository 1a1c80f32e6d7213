//! Budget model

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{amount, RecordId, UserId};
use crate::resource::{recency_then_id, Draft, OrderBy, Resource};

/// How often a budget resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        })
    }
}

impl FromStr for BudgetPeriod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(crate::Error::Validation(format!(
                "unknown budget period '{other}'"
            ))),
        }
    }
}

/// A spending budget for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: RecordId,
    pub user_id: UserId,
    pub category: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    /// Open-ended budgets are always active; dated ones through their end day.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.end_date.is_none_or(|end| end >= day)
    }
}

/// Writable fields of a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBudget {
    pub category: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewBudget {
    /// Monthly budget starting today, the default of a fresh form.
    pub fn monthly(category: impl Into<String>, amount: f64) -> Self {
        Self {
            category: category.into(),
            amount,
            period: BudgetPeriod::Monthly,
            start_date: crate::util::today(),
            end_date: None,
        }
    }

    pub fn from_existing(budget: &Budget) -> Self {
        Self {
            category: budget.category.clone(),
            amount: budget.amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
        }
    }
}

impl Draft for NewBudget {
    fn validate(&self) -> crate::Result<()> {
        if self.category.trim().is_empty() {
            return Err(crate::Error::Validation(
                "budget category is required".to_string(),
            ));
        }
        amount::validate(self.amount)?;
        if let Some(end_date) = self.end_date {
            if end_date < self.start_date {
                return Err(crate::Error::Validation(format!(
                    "end date {end_date} is before start date {}",
                    self.start_date
                )));
            }
        }
        Ok(())
    }
}

/// Budget totals over a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_budgets: usize,
    pub total_amount: f64,
    pub active_count: usize,
}

impl BudgetSummary {
    /// Summary with activity judged against `today`.
    pub fn as_of(records: &[Budget], today: NaiveDate) -> Self {
        Self {
            total_budgets: records.len(),
            total_amount: records.iter().map(|budget| budget.amount).sum(),
            active_count: records
                .iter()
                .filter(|budget| budget.is_active_on(today))
                .count(),
        }
    }
}

impl Resource for Budget {
    const TABLE: &'static str = "budgets";
    const ORDER: OrderBy = OrderBy::descending("created_at");

    type Draft = NewBudget;
    type Summary = BudgetSummary;

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
        recency_then_id(a, b)
    }

    fn summarize(records: &[Self]) -> BudgetSummary {
        BudgetSummary::as_of(records, crate::util::today())
    }

    fn from_draft(id: RecordId, owner: UserId, created_at: DateTime<Utc>, draft: NewBudget) -> Self {
        Self {
            id,
            user_id: owner,
            category: draft.category,
            amount: draft.amount,
            period: draft.period,
            start_date: draft.start_date,
            end_date: draft.end_date,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(id: u64, amount: f64, end_date: Option<&str>) -> Budget {
        Budget {
            id: RecordId::from(id),
            user_id: UserId::new("user"),
            category: "Groceries".to_string(),
            amount,
            period: BudgetPeriod::Monthly,
            start_date: "2024-01-01".parse().unwrap(),
            end_date: end_date.map(|date| date.parse().unwrap()),
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_active_count() {
        let records = vec![
            budget(1, 100.0, None),
            budget(2, 200.0, Some("2099-01-01")),
            budget(3, 300.0, Some("2000-01-01")),
        ];
        let summary = Budget::summarize(&records);
        assert_eq!(summary.total_budgets, 3);
        assert_eq!(summary.active_count, 2);
        assert!((summary.total_amount - 600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_budget_ending_today_is_active() {
        let today: NaiveDate = "2024-06-30".parse().unwrap();
        let records = vec![budget(1, 10.0, Some("2024-06-30")), budget(2, 10.0, Some("2024-06-29"))];
        assert_eq!(BudgetSummary::as_of(&records, today).active_count, 1);
    }

    #[test]
    fn test_null_end_date_deserializes() {
        let parsed: Budget = serde_json::from_str(
            r#"{"id":1,"user_id":"u","category":"Fun","amount":50,"period":"weekly",
                "start_date":"2024-01-01","end_date":null,"created_at":"2024-01-01T00:00:00+00:00"}"#,
        )
        .unwrap();
        assert_eq!(parsed.end_date, None);
        assert_eq!(parsed.period, BudgetPeriod::Weekly);
    }

    #[test]
    fn test_draft_rejects_inverted_dates() {
        let draft = NewBudget {
            start_date: "2024-02-01".parse().unwrap(),
            end_date: Some("2024-01-01".parse().unwrap()),
            ..NewBudget::monthly("Rent", 900.0)
        };
        assert!(draft.validate().is_err());
        assert!(NewBudget::monthly("Rent", 900.0).validate().is_ok());
        assert!(NewBudget::monthly(" ", 900.0).validate().is_err());
    }
}
