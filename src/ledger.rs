use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::balance::compute_expense_deltas;
use crate::error::LedgerError;
use crate::schemas::{Balances, Expense, NewExpense, SettlementTransaction, UserId};
use crate::settlement::settle_balances;
use crate::store::LedgerStore;

pub const NO_BALANCES_MESSAGE: &str = "No balances found for the user";
pub const NO_DEBTS_MESSAGE: &str = "No debts to settle";

// Keeps accumulated balances far away from f64 overflow.
pub const MAX_EXPENSE_AMOUNT: f64 = 1e12;

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, new_expense), fields(payer_id = %new_expense.payer_id))]
    pub async fn add_expense(&self, new_expense: NewExpense) -> Result<Expense, LedgerError> {
        validate_user_id(&new_expense.payer_id)?;
        validate_amount(new_expense.amount)?;
        let participants = dedup_participants(new_expense.participants)?;

        let expense = Expense {
            id: Uuid::new_v4(),
            payer_id: new_expense.payer_id,
            amount: new_expense.amount,
            participants,
            description: new_expense.description.unwrap_or_default(),
            created_at: Utc::now(),
        };
        let deltas = compute_expense_deltas(&expense.payer_id, expense.amount, &expense.participants);
        self.store.record_expense(&expense, &deltas).await?;

        tracing::info!(expense_id = %expense.id, participants = expense.participants.len(), "expense added");
        Ok(expense)
    }

    pub async fn apply_expense(
        &self,
        payer_id: &str,
        amount: f64,
        participants: Vec<UserId>,
    ) -> Result<(), LedgerError> {
        validate_user_id(payer_id)?;
        validate_amount(amount)?;
        let participants = dedup_participants(participants)?;

        let deltas = compute_expense_deltas(payer_id, amount, &participants);
        self.store.apply_deltas(&deltas).await?;
        Ok(())
    }

    pub async fn get_balances(&self, user_id: &str) -> Result<Balances, LedgerError> {
        validate_user_id(user_id)?;
        self.store
            .get_balances(user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(NO_BALANCES_MESSAGE.to_string()))
    }

    // Read-only: the suggested payments are never applied to the ledger.
    #[tracing::instrument(skip(self))]
    pub async fn settle(&self, user_id: &str) -> Result<Vec<SettlementTransaction>, LedgerError> {
        validate_user_id(user_id)?;
        let balances = match self.store.get_balances(user_id).await? {
            Some(balances) if !balances.is_empty() => balances,
            _ => return Err(LedgerError::NotFound(NO_DEBTS_MESSAGE.to_string())),
        };

        let transactions = settle_balances(&balances);
        tracing::debug!(transactions = transactions.len(), "settlement computed");
        Ok(transactions)
    }

    pub async fn expenses_by_payer(&self, payer_id: &str) -> Result<Vec<Expense>, LedgerError> {
        validate_user_id(payer_id)?;
        Ok(self.store.expenses_by_payer(payer_id).await?)
    }
}

// User ids end up as field names of the balance documents.
pub fn validate_user_id(user_id: &str) -> Result<(), LedgerError> {
    if user_id.trim().is_empty() {
        return Err(LedgerError::Validation("user id must not be empty".into()));
    }
    if user_id.contains('.') || user_id.starts_with('$') || user_id.contains('\0') {
        return Err(LedgerError::Validation(format!(
            "user id '{user_id}' must not contain '.', start with '$' or contain NUL"
        )));
    }
    Ok(())
}

fn validate_amount(amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    if amount > MAX_EXPENSE_AMOUNT {
        return Err(LedgerError::Validation(format!(
            "amount must not exceed {MAX_EXPENSE_AMOUNT}, got {amount}"
        )));
    }
    Ok(())
}

fn dedup_participants(participants: Vec<UserId>) -> Result<Vec<UserId>, LedgerError> {
    let mut unique: Vec<UserId> = Vec::with_capacity(participants.len());
    for participant in participants {
        validate_user_id(&participant)?;
        if !unique.contains(&participant) {
            unique.push(participant);
        }
    }
    if unique.is_empty() {
        return Err(LedgerError::Validation("participants must not be empty".into()));
    }
    Ok(unique)
}
