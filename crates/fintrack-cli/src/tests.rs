use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use fintrack_core::config::ClientConfig;
use fintrack_core::models::{
    BudgetPeriod, CategoryKind, NewTransaction, TransactionKind, TransactionSummary,
};
use fintrack_core::{
    Budget, Category, ChangeEvent, MemoryBackend, Mutation, RecordId, RemoteTable, Resource,
    StoreUpdate, SubscriptionStatus, Transaction, UserId,
};
use pretty_assertions::assert_eq;

use crate::cli::{
    BudgetFields, Cli, Commands, DeleteArgs, ResourceKind, TransactionCommands, TransactionFields,
};
use crate::commands::common::{is_affirmative, preview, resolve_record, short_id};
use crate::commands::config::merge_profile_values;
use crate::commands::dashboard::{Dashboard, DashboardCounts};
use crate::commands::records::{run_records, CliRecord, RecordAction};
use crate::commands::watch::describe_update;
use crate::connect::{connect_demo, DEMO_USER_ID};
use crate::error::CliError;

fn day(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

fn transaction(id: &str, kind: TransactionKind, amount: f64) -> Transaction {
    Transaction {
        id: RecordId::new(id),
        user_id: UserId::new("user-1"),
        amount,
        description: Some("Coffee beans".to_string()),
        category: Some("Food".to_string()),
        kind,
        date: day("2024-05-01"),
        created_at: DateTime::<Utc>::from_timestamp(1_714_521_600, 0).unwrap(),
    }
}

#[test]
fn parses_transaction_add() {
    let cli = Cli::try_parse_from([
        "fintrack",
        "transactions",
        "add",
        "--amount",
        "12.5",
        "--type",
        "income",
        "--date",
        "2024-05-02",
    ])
    .unwrap();
    let Commands::Transactions {
        command: TransactionCommands::Add(fields),
    } = cli.command
    else {
        panic!("expected transactions add");
    };
    assert_eq!(
        fields,
        TransactionFields {
            amount: Some(12.5),
            kind: Some(TransactionKind::Income),
            date: Some(day("2024-05-02")),
            ..TransactionFields::default()
        }
    );
}

#[test]
fn parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["fintrack", "watch", "budgets", "--demo", "--profile", "work"])
        .unwrap();
    assert!(cli.demo);
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert!(matches!(
        cli.command,
        Commands::Watch {
            resource: ResourceKind::Budgets,
            json: false
        }
    ));
}

#[test]
fn parses_dashboard_alias() {
    let cli = Cli::try_parse_from(["fintrack", "overview", "--watch"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Dashboard {
            watch: true,
            json: false
        }
    ));
}

#[test]
fn rejects_unknown_transaction_type() {
    assert!(Cli::try_parse_from(["fintrack", "tx", "add", "--amount", "1", "--type", "gift"]).is_err());
}

#[test]
fn resolve_record_matches_exact_then_unique_prefix() {
    let records = vec![
        transaction("0190a1b2-aaaa", TransactionKind::Expense, 1.0),
        transaction("0190a1b2-bbbb", TransactionKind::Expense, 2.0),
        transaction("77", TransactionKind::Income, 3.0),
    ];

    assert_eq!(resolve_record(&records, "77").unwrap().amount, 3.0);
    assert_eq!(resolve_record(&records, " 0190a1b2-b ").unwrap().amount, 2.0);
    assert!(matches!(
        resolve_record(&records, "0190a1b2"),
        Err(CliError::AmbiguousRecordId(message)) if message.contains("0190a1b2-aaaa")
    ));
    assert!(matches!(
        resolve_record(&records, "zzz"),
        Err(CliError::RecordNotFound("transactions", _))
    ));
    assert!(matches!(
        resolve_record(&records, "  "),
        Err(CliError::EmptyRecordId)
    ));
}

#[test]
fn confirmation_answers() {
    assert!(is_affirmative("y\n"));
    assert!(is_affirmative(" YES "));
    assert!(!is_affirmative(""));
    assert!(!is_affirmative("no"));
}

#[test]
fn preview_collapses_and_truncates() {
    assert_eq!(preview("  weekly   shop \nsecond line", 40), "weekly shop");
    assert_eq!(preview("abcdefghij", 6), "abc...");
    assert_eq!(short_id("0190a1b2-c3d4-7e5f"), "0190a1b2-c3d4");
}

#[test]
fn transaction_draft_requires_amount() {
    let error = Transaction::new_draft(TransactionFields::default(), day("2024-05-01")).unwrap_err();
    assert!(matches!(error, CliError::MissingField("amount")));

    let draft = Transaction::new_draft(
        TransactionFields {
            amount: Some(9.99),
            ..TransactionFields::default()
        },
        day("2024-05-01"),
    )
    .unwrap();
    assert_eq!(draft.kind, TransactionKind::Expense);
    assert_eq!(draft.date, day("2024-05-01"));
}

#[test]
fn edit_draft_keeps_unspecified_fields() {
    let existing = transaction("1", TransactionKind::Expense, 20.0);
    let draft = existing.edit_draft(TransactionFields {
        amount: Some(25.0),
        ..TransactionFields::default()
    });
    assert_eq!(
        draft,
        NewTransaction {
            amount: 25.0,
            ..NewTransaction::from_existing(&existing)
        }
    );
}

#[test]
fn budget_edit_can_clear_end_date() {
    let budget = Budget {
        id: RecordId::new("b1"),
        user_id: UserId::new("user-1"),
        category: "Food".to_string(),
        amount: 200.0,
        period: BudgetPeriod::Monthly,
        start_date: day("2024-01-01"),
        end_date: Some(day("2024-12-31")),
        created_at: DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap(),
    };
    let draft = budget.edit_draft(BudgetFields {
        open_ended: true,
        ..BudgetFields::default()
    });
    assert_eq!(draft.end_date, None);
    assert_eq!(draft.category, "Food");
}

#[test]
fn merge_prefers_explicit_then_env_then_existing() {
    let merged = merge_profile_values(
        ClientConfig {
            supabase_url: Some("https://explicit.supabase.co".to_string()),
            supabase_anon_key: None,
        },
        ClientConfig {
            supabase_url: Some("https://env.supabase.co".to_string()),
            supabase_anon_key: None,
        },
        ClientConfig::new("https://old.supabase.co", "old-key"),
    );
    assert_eq!(
        merged,
        ClientConfig::new("https://explicit.supabase.co", "old-key")
    );
}

#[test]
fn describe_update_prints_changes_and_skips_noise() {
    let record = transaction("42", TransactionKind::Income, 100.0);
    let summary = Transaction::summarize(std::slice::from_ref(&record));

    let changed = describe_update::<Transaction>(
        &StoreUpdate::Changed(ChangeEvent::Inserted(record.clone())),
        &summary,
        false,
    )
    .unwrap()
    .unwrap();
    assert!(changed.starts_with("inserted"));
    assert!(changed.contains("Balance:      100.00"));

    let as_json = describe_update::<Transaction>(
        &StoreUpdate::Changed(ChangeEvent::Removed(RecordId::new("42"))),
        &TransactionSummary::default(),
        true,
    )
    .unwrap()
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&as_json).unwrap();
    assert_eq!(value["event"], "removed");
    assert_eq!(value["id"], "42");
    assert_eq!(value["record"], serde_json::Value::Null);

    assert_eq!(
        describe_update::<Transaction>(
            &StoreUpdate::Unchanged(ChangeEvent::Updated(record)),
            &summary,
            false
        )
        .unwrap(),
        None
    );
    assert_eq!(
        describe_update::<Transaction>(
            &StoreUpdate::Status(SubscriptionStatus::Subscribed),
            &summary,
            false
        )
        .unwrap()
        .as_deref(),
        Some("[subscribed]")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn demo_backend_is_seeded_for_demo_user() {
    let (backend, identity) = connect_demo().await.unwrap();
    assert_eq!(identity.user_id, UserId::new(DEMO_USER_ID));

    let transactions = backend
        .query::<Transaction>(&identity.user_id)
        .await
        .unwrap();
    let categories = backend.query::<Category>(&identity.user_id).await.unwrap();
    let budgets = backend.query::<Budget>(&identity.user_id).await.unwrap();
    assert_eq!(transactions.len(), Transaction::samples(fintrack_core::util::today()).len());
    assert!(categories.iter().any(|category| category.kind == CategoryKind::Both));
    assert_eq!(budgets.len(), 2);
    assert!(transactions
        .windows(2)
        .all(|pair| pair[0].date >= pair[1].date));
}

#[tokio::test(flavor = "current_thread")]
async fn record_commands_round_trip_through_backend() {
    let backend = MemoryBackend::new();
    let owner = UserId::new("user-1");

    run_records::<Transaction, _>(
        RecordAction::Add(TransactionFields {
            amount: Some(30.0),
            description: Some("Books".to_string()),
            ..TransactionFields::default()
        }),
        backend.clone(),
        owner.clone(),
    )
    .await
    .unwrap();
    let stored = backend.query::<Transaction>(&owner).await.unwrap();
    assert_eq!(stored.len(), 1);
    let id = stored[0].id.to_string();

    run_records::<Transaction, _>(
        RecordAction::Edit {
            id: id[..6].to_string(),
            fields: TransactionFields {
                kind: Some(TransactionKind::Income),
                ..TransactionFields::default()
            },
        },
        backend.clone(),
        owner.clone(),
    )
    .await
    .unwrap();
    let stored = backend.query::<Transaction>(&owner).await.unwrap();
    assert_eq!(stored[0].kind, TransactionKind::Income);
    assert_eq!(stored[0].description.as_deref(), Some("Books"));

    run_records::<Transaction, _>(RecordAction::List { json: true }, backend.clone(), owner.clone())
        .await
        .unwrap();

    run_records::<Transaction, _>(
        RecordAction::Delete(DeleteArgs { id, yes: true }),
        backend.clone(),
        owner.clone(),
    )
    .await
    .unwrap();
    assert!(backend.query::<Transaction>(&owner).await.unwrap().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn rejected_add_reports_store_error() {
    let backend = MemoryBackend::new();
    let error = run_records::<Transaction, _>(
        RecordAction::Add(TransactionFields {
            amount: Some(-5.0),
            ..TransactionFields::default()
        }),
        backend,
        UserId::new("user-1"),
    )
    .await
    .unwrap_err();
    assert!(matches!(error, CliError::Store(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn dashboard_counts_follow_live_changes() {
    let (backend, identity) = connect_demo().await.unwrap();
    let today = fintrack_core::util::today();
    let mut dashboard = Dashboard::start(backend.clone(), identity.user_id.clone()).await;
    assert_eq!(backend.open_channels(), 3);

    let seeded = DashboardCounts {
        transactions: Transaction::samples(today).len(),
        categories: Category::samples(today).len(),
        budgets: Budget::samples(today).len(),
    };
    assert_eq!(dashboard.counts(), seeded);
    assert!(dashboard.render()[0].starts_with(&format!("Transactions: {}", seeded.transactions)));

    let draft = Transaction::samples(today).into_iter().next().unwrap();
    backend
        .write::<Transaction>(&identity.user_id, Mutation::Create(draft))
        .await
        .unwrap();
    let changed = tokio::time::timeout(std::time::Duration::from_secs(1), dashboard.next_change())
        .await
        .unwrap();
    assert_eq!(changed, Some(ResourceKind::Transactions));
    assert_eq!(dashboard.counts().transactions, seeded.transactions + 1);

    let json: serde_json::Value = serde_json::from_str(&dashboard.to_json().unwrap()).unwrap();
    assert_eq!(json["counts"]["transactions"], seeded.transactions + 1);
    assert_eq!(json["budgets"]["total_budgets"], seeded.budgets);

    dashboard.teardown();
    assert_eq!(backend.open_channels(), 0);
    assert_eq!(dashboard.next_change().await, None);
}

#[tokio::test(flavor = "current_thread")]
async fn dashboard_starts_even_when_one_resource_fails_to_load() {
    let backend = MemoryBackend::new();
    backend.fail_next_queries(1);
    let mut dashboard = Dashboard::start(backend.clone(), UserId::new("user-1")).await;
    assert_eq!(dashboard.counts(), DashboardCounts::default());
    assert_eq!(backend.open_channels(), 3);
    dashboard.teardown();
}

#[test]
fn default_log_filter_is_valid() {
    assert!(crate::DEFAULT_LOG_FILTER
        .parse::<tracing_subscriber::EnvFilter>()
        .is_ok());
}
