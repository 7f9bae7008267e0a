//! Address parsing helpers.
//!
//! Markets and programs are configured as base58 strings and handled as
//! [`Pubkey`] everywhere else.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

/// Parses one base58 address.
///
/// # Errors
///
/// Returns an error if the input is not a valid 32-byte base58 key.
pub fn parse_address(input: &str) -> Result<Pubkey, AddressError> {
    Pubkey::from_str(input.trim()).map_err(|e| AddressError::Invalid {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a comma-separated list of base58 addresses.
///
/// Blank entries are ignored, so an empty string yields an empty list.
///
/// # Errors
///
/// Returns the first address that fails to parse.
pub fn parse_address_list(list: &str) -> Result<Vec<Pubkey>, AddressError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_address)
        .collect()
}

/// Address parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Not a valid base58 key.
    #[error("invalid address {input}: {reason}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Parser message.
        reason: String,
    },
}

/// Serializes a [`Pubkey`] as its base58 string.
pub mod base58 {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    /// Serializes as base58.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    /// Deserializes from base58.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid address.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_address(&s).map_err(de::Error::custom)
    }
}
