use anyhow::Result;
use async_trait::async_trait;

use crate::schemas::{BalanceDelta, Balances, Expense};

mod memory;
mod mongo;

pub use memory::MemoryLedgerStore;
pub use mongo::MongoLedgerStore;

/// Durable ledger backing the service.
///
/// Every batch of deltas is applied atomically: either all of the increments
/// in a call land or none of them do, and concurrent increments of the same
/// (user, counterparty) cell never overwrite each other.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn record_expense(&self, expense: &Expense, deltas: &[BalanceDelta]) -> Result<()>;

    async fn apply_deltas(&self, deltas: &[BalanceDelta]) -> Result<()>;

    // `None` when the user has no record at all.
    async fn get_balances(&self, user_id: &str) -> Result<Option<Balances>>;

    // Newest first.
    async fn expenses_by_payer(&self, payer_id: &str) -> Result<Vec<Expense>>;

    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}
