use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fintrack_core::models::{BudgetPeriod, CategoryKind, TransactionKind};

#[derive(Parser)]
#[command(name = "fintrack")]
#[command(about = "Track income, spending and budgets with live sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for Supabase configuration and session
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Use an in-process backend with sample data instead of Supabase
    #[arg(long, global = true)]
    pub demo: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Income and expense entries
    #[command(alias = "tx")]
    Transactions {
        #[command(subcommand)]
        command: TransactionCommands,
    },
    /// Spending and income categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Spending limits per category
    Budgets {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Record counts and totals across all resources
    #[command(alias = "overview")]
    Dashboard {
        /// Keep refreshing as records change, until Ctrl-C
        #[arg(long)]
        watch: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print changes to a resource as they happen, until Ctrl-C
    Watch {
        #[arg(value_enum)]
        resource: ResourceKind,
        /// Output each change as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate a CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResourceKind {
    Transactions,
    Categories,
    Budgets,
}

/// Shared list/delete flags.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeleteArgs {
    /// Record ID or unique ID prefix
    pub id: String,
    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// List transactions, newest date first
    List(ListArgs),
    /// Record a transaction
    Add(TransactionFields),
    /// Change fields of a transaction
    Edit {
        /// Transaction ID or unique ID prefix
        id: String,
        #[command(flatten)]
        fields: TransactionFields,
    },
    /// Delete a transaction
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct TransactionFields {
    /// Positive amount
    #[arg(long)]
    pub amount: Option<f64>,
    /// income or expense
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<TransactionKind>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List categories, newest first
    List(ListArgs),
    /// Create a category
    Add(CategoryFields),
    /// Change fields of a category
    Edit {
        /// Category ID or unique ID prefix
        id: String,
        #[command(flatten)]
        fields: CategoryFields,
    },
    /// Delete a category
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFields {
    #[arg(long)]
    pub name: Option<String>,
    /// Color as #rrggbb
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
    /// income, expense or both
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<CategoryKind>,
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// List budgets, newest first
    List(ListArgs),
    /// Create a budget
    Add(BudgetFields),
    /// Change fields of a budget
    Edit {
        /// Budget ID or unique ID prefix
        id: String,
        #[command(flatten)]
        fields: BudgetFields,
    },
    /// Delete a budget
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct BudgetFields {
    #[arg(long)]
    pub category: Option<String>,
    /// Positive limit
    #[arg(long)]
    pub amount: Option<f64>,
    /// daily, weekly, monthly or yearly
    #[arg(long)]
    pub period: Option<BudgetPeriod>,
    /// First day as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    /// Last day as YYYY-MM-DD
    #[arg(long, conflicts_with = "open_ended")]
    pub end_date: Option<NaiveDate>,
    /// Remove the end date
    #[arg(long)]
    pub open_ended: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile configuration
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create a Supabase account for the profile
    Signup {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
