pub mod balance;
pub mod config;
pub mod error;
pub mod ledger;
pub mod routes;
pub mod schemas;
pub mod settlement;
pub mod store;
pub mod telemetry;
