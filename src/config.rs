//! Configuration management for StakeBridge

use serde::Deserialize;
use std::fs;

use crate::signing::DEFAULT_AUX_CHAIN_ID;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub signing: SigningConfig,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    pub rpc_addr: String,
    /// Fixed chain id. Leave unset to learn it from the engine at startup.
    #[serde(default)]
    pub chain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_aux_chain_id")]
    pub aux_chain_id: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            aux_chain_id: DEFAULT_AUX_CHAIN_ID,
        }
    }
}

fn default_data_path() -> String {
    "./data/bridge.db".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_aux_chain_id() -> u64 {
    DEFAULT_AUX_CHAIN_ID
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Provide sane defaults when config.toml is absent
        Config {
            engine: EngineConfig {
                rpc_addr: "http://127.0.0.1:26657".to_string(),
                chain_id: None,
            },
            database: DatabaseConfig {
                path: default_data_path(),
            },
            api: ApiConfig {
                port: default_api_port(),
            },
            signing: SigningConfig::default(),
        }
    } else {
        toml::from_str(&config_str)?
    };

    // Validate critical values
    if config.engine.rpc_addr.is_empty() {
        return Err("engine.rpc_addr must be set in config.toml".into());
    }

    if config.database.path.is_empty() {
        return Err("database.path must be set in config.toml".into());
    }

    if let Some(chain_id) = &config.engine.chain_id {
        if chain_id.is_empty() {
            return Err("engine.chain_id must be non-empty when set".into());
        }
    }

    Ok(config)
}
