use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::error::{
    ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LedgerStore;
use crate::schemas::{BalanceDelta, BalanceRecord, Balances, Expense, UserId};

const MAX_TRANSACTION_ATTEMPTS: u32 = 10;
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ExpenseDocument {
    #[serde(rename = "_id")]
    id: String,
    payer_id: UserId,
    amount: f64,
    participants: Vec<UserId>,
    #[serde(default)]
    description: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&Expense> for ExpenseDocument {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id.to_string(),
            payer_id: expense.payer_id.clone(),
            amount: expense.amount,
            participants: expense.participants.clone(),
            description: expense.description.clone(),
            created_at: expense.created_at,
        }
    }
}

impl TryFrom<ExpenseDocument> for Expense {
    type Error = anyhow::Error;

    fn try_from(document: ExpenseDocument) -> Result<Self> {
        let id = Uuid::parse_str(&document.id)
            .with_context(|| format!("expense {} has a malformed id", document.id))?;
        Ok(Expense {
            id,
            payer_id: document.payer_id,
            amount: document.amount,
            participants: document.participants,
            description: document.description,
            created_at: document.created_at,
        })
    }
}

/// MongoDB-backed store.
///
/// Writes run inside multi-document transactions, which requires the server
/// to be a replica set or sharded cluster.
pub struct MongoLedgerStore {
    client: Client,
    database: Database,
}

impl MongoLedgerStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to connect to MongoDB")?;
        let database = client.database(database);
        Ok(Self { client, database })
    }

    fn balances(&self) -> Collection<BalanceRecord> {
        self.database.collection("balances")
    }

    fn expenses(&self) -> Collection<ExpenseDocument> {
        self.database.collection("expenses")
    }

    async fn write_batch(
        &self,
        session: &mut ClientSession,
        expense: Option<&ExpenseDocument>,
        deltas: &[BalanceDelta],
    ) -> Result<(), AttemptError> {
        if let Some(expense) = expense {
            self.expenses()
                .insert_one_with_session(expense, None, session)
                .await
                .map_err(AttemptError::Expense)?;
        }
        let upsert = UpdateOptions::builder().upsert(true).build();
        for delta in deltas {
            let path = format!("balances.{}", delta.counterparty);
            self.balances()
                .update_one_with_session(
                    doc! { "user_id": delta.user_id.as_str() },
                    doc! { "$inc": { path: delta.amount } },
                    upsert.clone(),
                    session,
                )
                .await
                .map_err(AttemptError::Balance)?;
        }
        Ok(())
    }

    async fn commit(session: &mut ClientSession) -> mongodb::error::Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match session.commit_transaction().await {
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    tracing::warn!(attempt, error = %err, "retrying transaction commit");
                }
                result => return result,
            }
        }
    }

    async fn transact(
        &self,
        expense: Option<&ExpenseDocument>,
        deltas: &[BalanceDelta],
    ) -> Result<()> {
        let mut session = self
            .client
            .start_session(None)
            .await
            .context("Failed to start session")?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            session
                .start_transaction(None)
                .await
                .context("Failed to start transaction")?;

            let result = match self.write_batch(&mut session, expense, deltas).await {
                Ok(()) => Self::commit(&mut session).await.map_err(AttemptError::Commit),
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        tracing::debug!(error = %abort_err, "abort after failed write");
                    }
                    Err(err)
                }
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::warn!(attempt, error = ?err, "retrying ledger transaction");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(err) => {
                    return Err(err.into_inner()).context("Failed to apply ledger transaction")
                }
            }
        }
    }
}

// Failure of one transaction attempt, tagged with the step that failed.
#[derive(Debug)]
enum AttemptError {
    Expense(mongodb::error::Error),
    Balance(mongodb::error::Error),
    Commit(mongodb::error::Error),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            // Concurrent first upserts of one user race on the unique user_id
            // index; the loser finds the record on the next attempt.
            AttemptError::Balance(err) if is_duplicate_key(err) => true,
            AttemptError::Expense(err) | AttemptError::Balance(err) | AttemptError::Commit(err) => {
                err.contains_label(TRANSIENT_TRANSACTION_ERROR)
            }
        }
    }

    fn into_inner(self) -> mongodb::error::Error {
        match self {
            AttemptError::Expense(err) | AttemptError::Balance(err) | AttemptError::Commit(err) => {
                err
            }
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    #[tracing::instrument(skip_all, fields(expense_id = %expense.id, deltas = deltas.len()))]
    async fn record_expense(&self, expense: &Expense, deltas: &[BalanceDelta]) -> Result<()> {
        let document = ExpenseDocument::from(expense);
        self.transact(Some(&document), deltas).await
    }

    #[tracing::instrument(skip_all, fields(deltas = deltas.len()))]
    async fn apply_deltas(&self, deltas: &[BalanceDelta]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }
        self.transact(None, deltas).await
    }

    async fn get_balances(&self, user_id: &str) -> Result<Option<Balances>> {
        let record = self
            .balances()
            .find_one(doc! { "user_id": user_id }, None)
            .await
            .with_context(|| format!("Failed to load balances of {user_id}"))?;
        Ok(record.map(|record| record.balances))
    }

    async fn expenses_by_payer(&self, payer_id: &str) -> Result<Vec<Expense>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let documents: Vec<ExpenseDocument> = self
            .expenses()
            .find(doc! { "payer_id": payer_id }, options)
            .await
            .with_context(|| format!("Failed to query expenses of {payer_id}"))?
            .try_collect()
            .await
            .context("Failed to read expense cursor")?;
        documents.into_iter().map(Expense::try_from).collect()
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.database
            .collection::<bson::Document>("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await
            .context("Failed to create users index")?;
        self.expenses()
            .create_index(IndexModel::builder().keys(doc! { "payer_id": 1 }).build(), None)
            .await
            .context("Failed to create expenses index")?;
        self.balances()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await
            .context("Failed to create balances index")?;
        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
