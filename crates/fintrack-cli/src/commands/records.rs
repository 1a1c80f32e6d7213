//! list/add/edit/delete for the three resources.

use chrono::{Duration, NaiveDate};
use fintrack_core::models::{
    BudgetPeriod, BudgetSummary, CategoryKind, CategorySummary, NewBudget, NewCategory,
    NewTransaction, TransactionKind, TransactionSummary,
};
use fintrack_core::{
    Budget, Category, ChangeFeed, RemoteTable, Resource, ResourceController, Transaction, UserId,
};
use serde::Serialize;

use crate::cli::{
    BudgetCommands, BudgetFields, CategoryCommands, CategoryFields, DeleteArgs, TransactionCommands,
    TransactionFields,
};
use crate::commands::common::{confirm_delete, format_amount, preview, resolve_record, short_id};
use crate::error::CliError;

/// How a resource is entered and printed on the command line.
pub trait CliRecord: Resource {
    /// Singular noun for messages.
    const LABEL: &'static str;

    type Fields;

    fn new_draft(fields: Self::Fields, today: NaiveDate) -> Result<Self::Draft, CliError>;

    /// Draft with `fields` applied over this record's current values.
    fn edit_draft(&self, fields: Self::Fields) -> Self::Draft;

    fn row(&self) -> String;

    fn summary_lines(summary: &Self::Summary) -> Vec<String>;

    /// Sample drafts for demo mode.
    fn samples(today: NaiveDate) -> Vec<Self::Draft>;
}

impl CliRecord for Transaction {
    const LABEL: &'static str = "transaction";

    type Fields = TransactionFields;

    fn new_draft(fields: TransactionFields, today: NaiveDate) -> Result<NewTransaction, CliError> {
        Ok(NewTransaction {
            amount: fields.amount.ok_or(CliError::MissingField("amount"))?,
            description: fields.description,
            category: fields.category,
            kind: fields.kind.unwrap_or(TransactionKind::Expense),
            date: fields.date.unwrap_or(today),
        })
    }

    fn edit_draft(&self, fields: TransactionFields) -> NewTransaction {
        let mut draft = NewTransaction::from_existing(self);
        if let Some(amount) = fields.amount {
            draft.amount = amount;
        }
        if let Some(kind) = fields.kind {
            draft.kind = kind;
        }
        if let Some(date) = fields.date {
            draft.date = date;
        }
        if fields.category.is_some() {
            draft.category = fields.category;
        }
        if fields.description.is_some() {
            draft.description = fields.description;
        }
        draft
    }

    fn row(&self) -> String {
        let amount = format_amount(self.signed_amount());
        let category = self.category.as_deref().unwrap_or("-");
        let description = preview(self.description.as_deref().unwrap_or(""), 40);
        format!(
            "{:<13}  {}  {amount:>12}  {category:<16}  {description}",
            short_id(self.id.as_str()),
            self.date
        )
    }

    fn summary_lines(summary: &TransactionSummary) -> Vec<String> {
        vec![
            format!("Transactions: {}", summary.count),
            format!("Income:       {}", format_amount(summary.total_income)),
            format!("Expenses:     {}", format_amount(summary.total_expense)),
            format!("Balance:      {}", format_amount(summary.balance)),
        ]
    }

    fn samples(today: NaiveDate) -> Vec<NewTransaction> {
        let entry = |amount, kind, category: &str, description: &str, days_ago| NewTransaction {
            amount,
            description: Some(description.to_string()),
            category: Some(category.to_string()),
            kind,
            date: today - Duration::days(days_ago),
        };
        vec![
            entry(3200.0, TransactionKind::Income, "Salary", "Monthly salary", 14),
            entry(1150.0, TransactionKind::Expense, "Rent", "Apartment rent", 12),
            entry(64.3, TransactionKind::Expense, "Groceries", "Weekly shop", 3),
            entry(12.5, TransactionKind::Expense, "Food", "Lunch", 0),
        ]
    }
}

impl CliRecord for Category {
    const LABEL: &'static str = "category";

    type Fields = CategoryFields;

    fn new_draft(fields: CategoryFields, _today: NaiveDate) -> Result<NewCategory, CliError> {
        let name = fields.name.clone().ok_or(CliError::MissingField("name"))?;
        let mut draft = NewCategory::new(name);
        apply_category_fields(&mut draft, fields);
        Ok(draft)
    }

    fn edit_draft(&self, fields: CategoryFields) -> NewCategory {
        let mut draft = NewCategory::from_existing(self);
        apply_category_fields(&mut draft, fields);
        draft
    }

    fn row(&self) -> String {
        let icon = self.icon.as_deref().unwrap_or(" ");
        format!(
            "{:<13}  {icon} {:<20}  {:<8}  {}",
            short_id(self.id.as_str()),
            preview(&self.name, 20),
            self.kind.to_string(),
            self.color
        )
    }

    fn summary_lines(summary: &CategorySummary) -> Vec<String> {
        vec![
            format!("Categories: {}", summary.total_categories),
            format!("Income:     {}", summary.income_count),
            format!("Expense:    {}", summary.expense_count),
        ]
    }

    fn samples(_today: NaiveDate) -> Vec<NewCategory> {
        [
            ("Salary", "#10b981", CategoryKind::Income),
            ("Rent", "#ef4444", CategoryKind::Expense),
            ("Groceries", "#f59e0b", CategoryKind::Expense),
            ("Gifts", "#6366f1", CategoryKind::Both),
        ]
        .into_iter()
        .map(|(name, color, kind)| NewCategory {
            name: name.to_string(),
            color: color.to_string(),
            icon: None,
            kind,
        })
        .collect()
    }
}

fn apply_category_fields(draft: &mut NewCategory, fields: CategoryFields) {
    if let Some(name) = fields.name {
        draft.name = name;
    }
    if let Some(color) = fields.color {
        draft.color = color;
    }
    if fields.icon.is_some() {
        draft.icon = fields.icon;
    }
    if let Some(kind) = fields.kind {
        draft.kind = kind;
    }
}

impl CliRecord for Budget {
    const LABEL: &'static str = "budget";

    type Fields = BudgetFields;

    fn new_draft(fields: BudgetFields, today: NaiveDate) -> Result<NewBudget, CliError> {
        let category = fields
            .category
            .clone()
            .ok_or(CliError::MissingField("category"))?;
        let amount = fields.amount.ok_or(CliError::MissingField("amount"))?;
        let mut draft = NewBudget::monthly(category, amount);
        draft.start_date = today;
        apply_budget_fields(&mut draft, fields);
        Ok(draft)
    }

    fn edit_draft(&self, fields: BudgetFields) -> NewBudget {
        let mut draft = NewBudget::from_existing(self);
        apply_budget_fields(&mut draft, fields);
        draft
    }

    fn row(&self) -> String {
        let until = self
            .end_date
            .map_or_else(|| "open".to_string(), |end| end.to_string());
        format!(
            "{:<13}  {:<16}  {:>10}  {:<8}  {} .. {until}",
            short_id(self.id.as_str()),
            preview(&self.category, 16),
            format_amount(self.amount),
            self.period.to_string(),
            self.start_date
        )
    }

    fn summary_lines(summary: &BudgetSummary) -> Vec<String> {
        vec![
            format!("Budgets: {}", summary.total_budgets),
            format!("Total:   {}", format_amount(summary.total_amount)),
            format!("Active:  {}", summary.active_count),
        ]
    }

    fn samples(today: NaiveDate) -> Vec<NewBudget> {
        let start = today - Duration::days(30);
        vec![
            NewBudget {
                category: "Groceries".to_string(),
                amount: 400.0,
                period: BudgetPeriod::Monthly,
                start_date: start,
                end_date: None,
            },
            NewBudget {
                category: "Food".to_string(),
                amount: 60.0,
                period: BudgetPeriod::Weekly,
                start_date: start,
                end_date: Some(today + Duration::days(60)),
            },
        ]
    }
}

fn apply_budget_fields(draft: &mut NewBudget, fields: BudgetFields) {
    if let Some(category) = fields.category {
        draft.category = category;
    }
    if let Some(amount) = fields.amount {
        draft.amount = amount;
    }
    if let Some(period) = fields.period {
        draft.period = period;
    }
    if let Some(start_date) = fields.start_date {
        draft.start_date = start_date;
    }
    if fields.open_ended {
        draft.end_date = None;
    } else if fields.end_date.is_some() {
        draft.end_date = fields.end_date;
    }
}

/// One record command with resource-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordAction<F> {
    List { json: bool },
    Add(F),
    Edit { id: String, fields: F },
    Delete(DeleteArgs),
}

impl From<TransactionCommands> for RecordAction<TransactionFields> {
    fn from(command: TransactionCommands) -> Self {
        match command {
            TransactionCommands::List(args) => Self::List { json: args.json },
            TransactionCommands::Add(fields) => Self::Add(fields),
            TransactionCommands::Edit { id, fields } => Self::Edit { id, fields },
            TransactionCommands::Delete(args) => Self::Delete(args),
        }
    }
}

impl From<CategoryCommands> for RecordAction<CategoryFields> {
    fn from(command: CategoryCommands) -> Self {
        match command {
            CategoryCommands::List(args) => Self::List { json: args.json },
            CategoryCommands::Add(fields) => Self::Add(fields),
            CategoryCommands::Edit { id, fields } => Self::Edit { id, fields },
            CategoryCommands::Delete(args) => Self::Delete(args),
        }
    }
}

impl From<BudgetCommands> for RecordAction<BudgetFields> {
    fn from(command: BudgetCommands) -> Self {
        match command {
            BudgetCommands::List(args) => Self::List { json: args.json },
            BudgetCommands::Add(fields) => Self::Add(fields),
            BudgetCommands::Edit { id, fields } => Self::Edit { id, fields },
            BudgetCommands::Delete(args) => Self::Delete(args),
        }
    }
}

pub async fn run_records<R, B>(
    action: RecordAction<R::Fields>,
    backend: B,
    owner: UserId,
) -> Result<(), CliError>
where
    R: CliRecord,
    R::Summary: Serialize,
    B: RemoteTable + ChangeFeed,
{
    let mut controller = ResourceController::<R, B>::new(backend, owner);

    match action {
        RecordAction::List { json } => {
            controller.store_mut().initialize().await?;
            print_records(&controller, json)?;
        }
        RecordAction::Add(fields) => {
            let draft = R::new_draft(fields, fintrack_core::util::today())?;
            let created = controller.create(draft).await?;
            println!("{}", created.row());
        }
        RecordAction::Edit { id, fields } => {
            controller.store_mut().initialize().await?;
            let existing = resolve_record(controller.records(), &id)?.clone();
            let draft = existing.edit_draft(fields);
            let updated = controller.update(existing.id().clone(), draft).await?;
            println!("{}", updated.row());
        }
        RecordAction::Delete(args) => {
            controller.store_mut().initialize().await?;
            let existing = resolve_record(controller.records(), &args.id)?.clone();
            let label = format!("{} {}", R::LABEL, existing.row().trim_end());
            match confirm_delete(&label, &existing, args.yes)? {
                Some(confirmation) => {
                    let removed = controller.delete(confirmation).await?;
                    println!("{}", removed.id());
                }
                None => println!("Cancelled"),
            }
        }
    }

    Ok(())
}

pub fn print_records<R, B>(controller: &ResourceController<R, B>, as_json: bool) -> Result<(), CliError>
where
    R: CliRecord,
    R::Summary: Serialize,
    B: RemoteTable + ChangeFeed,
{
    let summary = controller.summary();
    if as_json {
        let output = serde_json::json!({
            "records": controller.records(),
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for record in controller.records() {
        println!("{}", record.row());
    }
    if !controller.records().is_empty() {
        println!();
    }
    for line in R::summary_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}
