//! Category model

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, UserId};
use crate::resource::{recency_then_id, Draft, OrderBy, Resource};

pub const DEFAULT_CATEGORY_COLOR: &str = "#6366f1";

/// Which transactions a category applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
    Both,
}

impl CategoryKind {
    pub const fn covers_income(self) -> bool {
        matches!(self, Self::Income | Self::Both)
    }

    pub const fn covers_expense(self) -> bool {
        matches!(self, Self::Expense | Self::Both)
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Both => "both",
        })
    }
}

impl FromStr for CategoryKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "both" => Ok(Self::Both),
            other => Err(crate::Error::Validation(format!(
                "unknown category type '{other}'"
            ))),
        }
    }
}

/// A user-defined category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub created_at: DateTime<Utc>,
}

fn default_color() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

/// Writable fields of a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: default_color(),
            icon: None,
            kind: CategoryKind::Expense,
        }
    }

    pub fn from_existing(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            color: category.color.clone(),
            icon: category.icon.clone(),
            kind: category.kind,
        }
    }
}

impl Draft for NewCategory {
    fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Validation(
                "category name is required".to_string(),
            ));
        }
        if !is_hex_color(&self.color) {
            return Err(crate::Error::Validation(format!(
                "color must look like #rrggbb, got '{}'",
                self.color
            )));
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Category counts by type; `both` counts toward income and expense
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub total_categories: usize,
    pub income_count: usize,
    pub expense_count: usize,
}

impl Resource for Category {
    const TABLE: &'static str = "categories";
    const ORDER: OrderBy = OrderBy::descending("created_at");

    type Draft = NewCategory;
    type Summary = CategorySummary;

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

    fn summarize(records: &[Self]) -> CategorySummary {
        CategorySummary {
            total_categories: records.len(),
            income_count: records.iter().filter(|c| c.kind.covers_income()).count(),
            expense_count: records.iter().filter(|c| c.kind.covers_expense()).count(),
        }
    }

    fn from_draft(id: RecordId, owner: UserId, created_at: DateTime<Utc>, draft: NewCategory) -> Self {
        Self {
            id,
            user_id: owner,
            name: draft.name,
            color: draft.color,
            icon: draft.icon,
            kind: draft.kind,
            created_at,
        }
    }
}
