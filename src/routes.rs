use actix_web::{error, get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::schemas::{Balances, NewExpense, UserId};

#[derive(Deserialize, Serialize)]
struct SettleJson {
    user_id: UserId,
}

// Serialized directly so counterparties keep their ledger order.
#[derive(Serialize)]
struct BalancesJson {
    balances: Balances,
}

#[derive(Deserialize)]
struct PayerQuery {
    payer_id: UserId,
}

#[post("/expenses")]
async fn add_expense(
    ledger: web::Data<Ledger>,
    expense: web::Json<NewExpense>,
) -> Result<HttpResponse, LedgerError> {
    let expense = ledger.add_expense(expense.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Expense added",
        "expense_id": expense.id,
    })))
}

#[get("/expenses")]
async fn list_expenses(
    ledger: web::Data<Ledger>,
    query: web::Query<PayerQuery>,
) -> Result<HttpResponse, LedgerError> {
    let expenses = ledger.expenses_by_payer(&query.payer_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "expenses": expenses })))
}

#[get("/balances/{user_id}")]
async fn get_balances(
    ledger: web::Data<Ledger>,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, LedgerError> {
    let balances = ledger.get_balances(&user_id).await?;
    Ok(HttpResponse::Ok().json(BalancesJson { balances }))
}

#[post("/settle")]
async fn settle(
    ledger: web::Data<Ledger>,
    json: web::Json<SettleJson>,
) -> Result<HttpResponse, LedgerError> {
    let transactions = ledger.settle(&json.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "transactions": transactions })))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn bad_request(err: impl std::fmt::Display, _req: &HttpRequest) -> error::Error {
    LedgerError::Validation(err.to_string()).into()
}

// Malformed bodies and queries are reported like ledger validation errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, req| bad_request(err, req)))
        .app_data(web::QueryConfig::default().error_handler(|err, req| bad_request(err, req)))
        .service(add_expense)
        .service(list_expenses)
        .service(get_balances)
        .service(settle)
        .service(health);
}
