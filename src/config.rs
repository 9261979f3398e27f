use std::env;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("You need to add the MONGODB_URI to the env")]
    MissingMongoUri,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub store: StoreBackend,
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub bind_addr: String,
    pub port: u16,
    pub allowed_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup("SPLITWISE_STORE").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "SPLITWISE_STORE",
                    value: other.to_string(),
                })
            }
        };

        let mongodb_uri = lookup("MONGODB_URI");
        if store == StoreBackend::Mongo && mongodb_uri.is_none() {
            return Err(ConfigError::MissingMongoUri);
        }

        let port = match lookup("SPLITWISE_PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SPLITWISE_PORT",
                value: port,
            })?,
            None => 8080,
        };

        Ok(Config {
            store,
            mongodb_uri,
            database: lookup("SPLITWISE_DATABASE").unwrap_or_else(|| "splitwise".to_string()),
            bind_addr: lookup("SPLITWISE_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            allowed_origin: lookup("SPLITWISE_ALLOWED_ORIGIN"),
        })
    }
}
