//! fintrack-core - Core library for FinTrack
//!
//! Owner-scoped, live-updating collections of transactions, categories and
//! budgets backed by a Supabase project (or an in-process backend), plus the
//! auth and configuration plumbing the interfaces share.

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod remote;
pub mod resource;
pub mod session;
pub mod store;
pub mod sync;
pub mod util;

pub use controller::{
    BudgetController, CategoryController, ControllerRegistry, DeleteConfirmation,
    ResourceController, TransactionController,
};
pub use error::{Error, Result};
pub use models::{Budget, Category, RecordId, Transaction, UserId};
pub use remote::{ChangeFeed, MemoryBackend, Mutation, RemoteTable, SupabaseBackend};
pub use resource::Resource;
pub use session::{GateOutcome, Identity, SessionGate, SessionSource};
pub use store::{RemoteCollectionStore, StoreError, StoreUpdate};
pub use sync::{ChangeEvent, SubscriptionStatus};
