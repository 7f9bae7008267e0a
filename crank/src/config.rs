//! Crank service configuration.
//!
//! Provides configuration options for the crank service and the sources
//! they are loaded from at startup.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use solana_sdk::pubkey::Pubkey;

use crate::address::{parse_address, parse_address_list, AddressError};

/// Default settlement program (base58).
pub const DEFAULT_PROGRAM_ID: &str = "opnb2LAfJYbRMAHHvqjCwQxanZn7ReEHp1k81EohpZb";

/// Configuration for the crank service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrankConfig {
    /// Tick interval in milliseconds.
    pub interval_ms: u64,

    /// Blockhash refresh interval in milliseconds.
    pub fee_refresh_interval_ms: u64,

    /// Markets to crank (base58-encoded addresses).
    pub markets: Vec<String>,

    /// Markets whose batches always pay the priority fee.
    pub priority_markets: Vec<String>,

    /// Settlement program (base58).
    pub program_id: String,

    /// Maximum events a single settlement instruction consumes.
    pub consume_events_limit: u64,

    /// Minimum queue depth before a market is cranked.
    pub min_events: usize,

    /// Maximum settlement instructions per transaction.
    pub max_tx_instructions: usize,

    /// Maximum distinct accounts per transaction.
    pub max_tx_accounts: usize,

    /// Compute unit price in micro-lamports for normal batches.
    pub cu_price: u64,

    /// Compute unit price in micro-lamports for priority batches.
    pub priority_cu_price: u64,

    /// Compute units budgeted per settlement instruction.
    pub cu_limit_per_instruction: u32,

    /// Queue depth above which a market is treated as congested.
    pub priority_queue_limit: usize,

    /// Only record queue depths, never submit.
    pub queue_only: bool,

    /// Verbose per-tick logging.
    pub debug: bool,
}

impl Default for CrankConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            fee_refresh_interval_ms: 1000,
            markets: Vec::new(),
            priority_markets: Vec::new(),
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            consume_events_limit: 19,
            min_events: 1,
            max_tx_instructions: 1,
            max_tx_accounts: 25,
            cu_price: 1,
            priority_cu_price: 100_000,
            cu_limit_per_instruction: 50_000,
            priority_queue_limit: 100,
            queue_only: false,
            debug: false,
        }
    }
}

impl CrankConfig {
    /// Creates a new configuration with the given markets.
    #[must_use]
    pub fn with_markets(markets: Vec<String>) -> Self {
        Self {
            markets,
            ..Default::default()
        }
    }

    /// Sets the priority markets.
    #[must_use]
    pub fn with_priority_markets(mut self, markets: Vec<String>) -> Self {
        self.priority_markets = markets;
        self
    }

    /// Sets the tick interval.
    #[must_use]
    pub fn with_interval(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Sets the normal and priority compute unit prices.
    #[must_use]
    pub fn with_cu_prices(mut self, normal: u64, priority: u64) -> Self {
        self.cu_price = normal;
        self.priority_cu_price = priority;
        self
    }

    /// Sets the per-transaction instruction and account ceilings.
    #[must_use]
    pub fn with_ceilings(mut self, instructions: usize, accounts: usize) -> Self {
        self.max_tx_instructions = instructions;
        self.max_tx_accounts = accounts;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        if self.fee_refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidFeeRefreshInterval);
        }

        if self.markets.is_empty() {
            return Err(ConfigError::NoMarkets);
        }

        if self.max_tx_instructions == 0 {
            return Err(ConfigError::InvalidInstructionCeiling);
        }

        // market + event queue + at least one settlement target
        if self.max_tx_accounts < 3 {
            return Err(ConfigError::InvalidAccountCeiling(self.max_tx_accounts));
        }

        if self.consume_events_limit == 0 {
            return Err(ConfigError::InvalidConsumeLimit);
        }

        if self.cu_limit_per_instruction == 0 {
            return Err(ConfigError::InvalidComputeUnits);
        }

        if self.priority_cu_price < self.cu_price {
            return Err(ConfigError::InvalidCuPriceRange);
        }

        self.parse_markets()?;
        self.parse_priority_markets()?;
        self.parse_program_id()?;

        Ok(())
    }

    /// Parses market addresses from base58 strings.
    ///
    /// # Errors
    ///
    /// Returns an error if any address is invalid.
    pub fn parse_markets(&self) -> Result<Vec<Pubkey>, ConfigError> {
        parse_addresses(&self.markets)
    }

    /// Parses priority market addresses from base58 strings.
    ///
    /// # Errors
    ///
    /// Returns an error if any address is invalid.
    pub fn parse_priority_markets(&self) -> Result<Vec<Pubkey>, ConfigError> {
        parse_addresses(&self.priority_markets)
    }

    /// Parses the settlement program id.
    ///
    /// # Errors
    ///
    /// Returns an error if the program id is invalid.
    pub fn parse_program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_address(&self.program_id).map_err(ConfigError::InvalidAddress)
    }
}

fn parse_addresses(values: &[String]) -> Result<Vec<Pubkey>, ConfigError> {
    values
        .iter()
        .map(|s| parse_address(s).map_err(ConfigError::InvalidAddress))
        .collect()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid tick interval.
    #[error("interval_ms must be > 0")]
    InvalidInterval,

    /// Invalid blockhash refresh interval.
    #[error("fee_refresh_interval_ms must be > 0")]
    InvalidFeeRefreshInterval,

    /// No markets configured.
    #[error("at least one market is required")]
    NoMarkets,

    /// Invalid instruction ceiling.
    #[error("max_tx_instructions must be > 0")]
    InvalidInstructionCeiling,

    /// Invalid account ceiling.
    #[error("max_tx_accounts must be >= 3, got {0}")]
    InvalidAccountCeiling(usize),

    /// Invalid consume limit.
    #[error("consume_events_limit must be > 0")]
    InvalidConsumeLimit,

    /// Invalid compute unit budget.
    #[error("cu_limit_per_instruction must be > 0")]
    InvalidComputeUnits,

    /// Priority price below the normal price.
    #[error("cu_price must be <= priority_cu_price")]
    InvalidCuPriceRange,

    /// Invalid address.
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] AddressError),

    /// A raw value could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// A JSON document could not be parsed.
    #[error("invalid config document: {0}")]
    Json(String),
}

/// A source the crank configuration is loaded from at startup.
pub trait ConfigSource {
    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but malformed.
    fn load(&self) -> Result<CrankConfig, ConfigError>;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Loads configuration from environment variables.
///
/// Unset variables keep their defaults.
pub struct EnvConfigSource {
    lookup: Lookup,
}

impl Default for EnvConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvConfigSource {
    /// Reads from the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Reads through a custom lookup function.
    #[must_use]
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn get<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match (self.lookup)(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    fn get_flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match (self.lookup)(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(Some(true)),
                "0" | "false" | "no" | "" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
            },
            None => Ok(None),
        }
    }

    fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match (self.lookup)(key) {
            Some(raw) => {
                let addresses = parse_address_list(&raw).map_err(ConfigError::InvalidAddress)?;
                Ok(Some(addresses.iter().map(Pubkey::to_string).collect()))
            }
            None => Ok(None),
        }
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> Result<CrankConfig, ConfigError> {
        let mut config = CrankConfig::default();

        if let Some(v) = self.get("INTERVAL")? {
            config.interval_ms = v;
        }
        if let Some(v) = self.get("FEE_REFRESH_INTERVAL")? {
            config.fee_refresh_interval_ms = v;
        }
        if let Some(v) = self.get_list("MARKETS")? {
            config.markets = v;
        }
        if let Some(v) = self.get_list("PRIORITY_MARKETS")? {
            config.priority_markets = v;
        }
        if let Some(v) = self.get::<String>("PROGRAM_ID")? {
            config.program_id = v;
        }
        if let Some(v) = self.get("CONSUME_EVENTS_LIMIT")? {
            config.consume_events_limit = v;
        }
        if let Some(v) = self.get("MIN_EVENTS")? {
            config.min_events = v;
        }
        if let Some(v) = self.get("MAX_TX_INSTRUCTIONS")? {
            config.max_tx_instructions = v;
        }
        if let Some(v) = self.get("MAX_TX_ACCOUNTS")? {
            config.max_tx_accounts = v;
        }
        if let Some(v) = self.get("CU_PRICE")? {
            config.cu_price = v;
        }
        if let Some(v) = self.get("PRIORITY_CU_PRICE")? {
            config.priority_cu_price = v;
        }
        if let Some(v) = self.get("PRIORITY_CU_LIMIT")? {
            config.cu_limit_per_instruction = v;
        }
        if let Some(v) = self.get("PRIORITY_QUEUE_LIMIT")? {
            config.priority_queue_limit = v;
        }
        if let Some(v) = self.get_flag("QUEUE_ONLY")? {
            config.queue_only = v;
        }
        if let Some(v) = self.get_flag("DEBUG")? {
            config.debug = v;
        }

        Ok(config)
    }
}

/// Loads configuration from a JSON document.
///
/// Missing fields keep their defaults.
#[derive(Debug, Clone)]
pub struct JsonConfigSource {
    document: String,
}

impl JsonConfigSource {
    /// Wraps a JSON document.
    #[must_use]
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

impl ConfigSource for JsonConfigSource {
    fn load(&self) -> Result<CrankConfig, ConfigError> {
        serde_json::from_str(&self.document).map_err(|e| ConfigError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const MARKET: &str = "11111111111111111111111111111111";

    fn env_source(vars: &[(&str, &str)]) -> EnvConfigSource {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvConfigSource::with_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = CrankConfig::default();
        assert!(config.markets.is_empty());
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.consume_events_limit, 19);
        assert_eq!(config.max_tx_instructions, 1);
        assert_eq!(config.max_tx_accounts, 25);
        assert_eq!(config.cu_limit_per_instruction, 50_000);
        assert_eq!(config.priority_cu_price, 100_000);
    }

    #[test]
    fn test_config_builder() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()])
            .with_interval(200)
            .with_cu_prices(5, 500)
            .with_ceilings(4, 30);

        assert_eq!(config.interval_ms, 200);
        assert_eq!(config.cu_price, 5);
        assert_eq!(config.priority_cu_price, 500);
        assert_eq!(config.max_tx_instructions, 4);
        assert_eq!(config.max_tx_accounts, 30);
    }

    #[test]
    fn test_config_validate_valid() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_no_markets() {
        assert_eq!(
            CrankConfig::default().validate(),
            Err(ConfigError::NoMarkets)
        );
    }

    #[test]
    fn test_config_validate_invalid_interval() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()]).with_interval(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval));
    }

    #[test]
    fn test_config_validate_invalid_ceilings() {
        let base = CrankConfig::with_markets(vec![MARKET.to_string()]);

        assert_eq!(
            base.clone().with_ceilings(0, 25).validate(),
            Err(ConfigError::InvalidInstructionCeiling)
        );
        assert_eq!(
            base.with_ceilings(1, 2).validate(),
            Err(ConfigError::InvalidAccountCeiling(2))
        );
    }

    #[test]
    fn test_config_validate_invalid_price_range() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()]).with_cu_prices(100, 10);
        assert_eq!(config.validate(), Err(ConfigError::InvalidCuPriceRange));
    }

    #[test]
    fn test_config_validate_invalid_priority_market() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()])
            .with_priority_markets(vec!["invalid!".to_string()]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_config_parse_markets() {
        let config = CrankConfig::with_markets(vec![MARKET.to_string()]);
        let markets = config.parse_markets().expect("markets");
        assert_eq!(markets, vec![Pubkey::default()]);
    }

    #[test]
    fn test_config_parse_program_id() {
        let program = CrankConfig::default().parse_program_id().expect("program");
        assert_eq!(program.to_string(), DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_env_source_defaults() {
        let config = env_source(&[]).load().expect("load");
        assert_eq!(config, CrankConfig::default());
    }

    #[test]
    fn test_env_source_overrides() {
        let markets = format!("{MARKET},{MARKET}");
        let config = env_source(&[
            ("INTERVAL", "250"),
            ("MARKETS", markets.as_str()),
            ("MAX_TX_INSTRUCTIONS", "3"),
            ("PRIORITY_CU_LIMIT", "80000"),
            ("QUEUE_ONLY", "1"),
            ("DEBUG", "true"),
        ])
        .load()
        .expect("load");

        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.markets.len(), 2);
        assert_eq!(config.max_tx_instructions, 3);
        assert_eq!(config.cu_limit_per_instruction, 80_000);
        assert!(config.queue_only);
        assert!(config.debug);
    }

    #[test]
    fn test_env_source_invalid_number() {
        let err = env_source(&[("MIN_EVENTS", "many")]).load().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "MIN_EVENTS".to_string(),
                value: "many".to_string(),
            }
        );
    }

    #[test]
    fn test_env_source_invalid_market() {
        let err = env_source(&[("MARKETS", "nope!")]).load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }

    #[test]
    fn test_json_source_partial() {
        let json = format!(r#"{{"markets": ["{MARKET}"], "max_tx_instructions": 2}}"#);
        let config = JsonConfigSource::new(json).load().expect("load");

        assert_eq!(config.markets, vec![MARKET.to_string()]);
        assert_eq!(config.max_tx_instructions, 2);
        assert_eq!(config.interval_ms, 1000);
    }

    #[test]
    fn test_json_source_invalid() {
        let err = JsonConfigSource::new("{not json").load().unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
