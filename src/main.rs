use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;

use splitledger::config::{Config, StoreBackend};
use splitledger::ledger::Ledger;
use splitledger::store::{LedgerStore, MemoryLedgerStore, MongoLedgerStore};
use splitledger::{routes, telemetry};

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match (config.store, &config.mongodb_uri) {
        (StoreBackend::Mongo, Some(uri)) => {
            let store = MongoLedgerStore::connect(uri, &config.database).await?;
            store.ensure_indexes().await?;
            tracing::info!(database = %config.database, "connected to MongoDB");
            Ok(Arc::new(store))
        }
        (StoreBackend::Mongo, None) => anyhow::bail!("MONGODB_URI is not set"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using the in-memory store, balances are lost on exit");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
    }
}

fn cors(allowed_origin: Option<&str>) -> Cors {
    match allowed_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET", "POST"])
            .allow_any_header(),
        None => Cors::permissive(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let config = Config::from_env().context("invalid configuration")?;

    let store = open_store(&config).await?;
    let ledger = Ledger::new(Arc::clone(&store));

    tracing::info!(addr = %config.bind_addr, port = config.port, "starting server");
    let allowed_origin = config.allowed_origin.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(allowed_origin.as_deref()))
            .app_data(web::Data::new(ledger.clone()))
            .configure(routes::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    tracing::info!("server stopped, closing store");
    store.close().await;
    Ok(())
}
