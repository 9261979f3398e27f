use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::LedgerStore;
use crate::balance::apply_deltas_to;
use crate::schemas::{BalanceDelta, Balances, Expense, UserId};

#[derive(Default)]
struct MemoryState {
    balances: HashMap<UserId, Balances>,
    expenses: Vec<Expense>,
}

/// Process-local store. Each call takes a single write lock, so batches are
/// atomic and linearizable.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: RwLock<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = (UserId, Balances)>) -> Self {
        let state = MemoryState {
            balances: records.into_iter().collect(),
            expenses: Vec::new(),
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn record_expense(&self, expense: &Expense, deltas: &[BalanceDelta]) -> Result<()> {
        let mut state = self.state.write().await;
        state.expenses.push(expense.clone());
        apply_deltas_to(&mut state.balances, deltas);
        Ok(())
    }

    async fn apply_deltas(&self, deltas: &[BalanceDelta]) -> Result<()> {
        let mut state = self.state.write().await;
        apply_deltas_to(&mut state.balances, deltas);
        Ok(())
    }

    async fn get_balances(&self, user_id: &str) -> Result<Option<Balances>> {
        let state = self.state.read().await;
        Ok(state.balances.get(user_id).cloned())
    }

    async fn expenses_by_payer(&self, payer_id: &str) -> Result<Vec<Expense>> {
        let state = self.state.read().await;
        let mut expenses: Vec<Expense> = state
            .expenses
            .iter()
            .filter(|expense| expense.payer_id == payer_id)
            .cloned()
            .collect();
        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(expenses)
    }
}
