use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = String;

// Positive means the counterparty owes the user. Counterparties stay in the
// order they first appeared, which is the order settlement walks them in.
pub type Balances = IndexMap<UserId, f64>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expense {
    pub id: Uuid,
    pub payer_id: UserId,
    pub amount: f64,
    pub participants: Vec<UserId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewExpense {
    pub payer_id: UserId,
    pub amount: f64,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct BalanceRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub balances: Balances,
}

impl BalanceRecord {
    // No entry means the two users are even.
    pub fn balance_with(&self, counterparty: &str) -> f64 {
        match self.balances.get(counterparty) {
            Some(amount) => *amount,
            None => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BalanceDelta {
    pub user_id: UserId,
    pub counterparty: UserId,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SettlementTransaction {
    pub from: UserId,
    pub to: UserId,
    pub amount: f64,
}
