//! Engine configuration.
//!
//! This module defines the TOML-deserializable configuration for
//! [`ProrationEngine`](crate::quote::ProrationEngine).
//!
//! ```toml
//! change_date_policy = "clamp"
//! rounding = "half_even"
//!
//! [minor_units]
//! CLF = 4
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::{
    error::{ProrationError, Result},
    money::{Currency, MAX_MINOR_UNITS, RoundingMode},
};

/// What to do with a change date that lies far outside the current period.
///
/// Dates within one billing interval of the current period are always
/// clamped to the period boundaries. This policy only governs dates beyond
/// that window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDatePolicy {
    /// Return [`ProrationError::InvalidChangeDate`].
    #[default]
    Reject,
    /// Clamp the date to the current period.
    Clamp,
}

/// Root engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Handling of change dates outside the accepted window.
    #[serde(default)]
    pub change_date_policy: ChangeDatePolicy,

    /// Rounding rule for every monetary step.
    #[serde(default)]
    pub rounding: RoundingMode,

    /// Minor-unit exponent overrides keyed by uppercase ISO 4217 code.
    ///
    /// Keys are uppercased when deserialized; two keys that differ only in
    /// case are rejected.
    #[serde(default, deserialize_with = "deserialize_minor_units")]
    pub minor_units: HashMap<String, u32>,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ConfigError`] on malformed TOML or invalid values.
    ///
    /// # Examples
    ///
    /// ```
    /// use proration_engine::config::{ChangeDatePolicy, EngineConfig};
    ///
    /// let config = EngineConfig::from_toml(r#"change_date_policy = "clamp""#).unwrap();
    /// assert_eq!(config.change_date_policy, ChangeDatePolicy::Clamp);
    /// ```
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProrationError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Validates the configuration.
    ///
    /// Checks that every `minor_units` key is a valid uppercase currency code
    /// and that no exponent exceeds [`MAX_MINOR_UNITS`].
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ConfigError`] if any check fails.
    pub fn validate(&self) -> Result<()> {
        for (code, exponent) in &self.minor_units {
            let currency =
                Currency::new(code).map_err(|e| ProrationError::ConfigError(e.to_string()))?;
            if currency.code() != code.as_str() {
                return Err(ProrationError::ConfigError(format!(
                    "minor_units key {code} must be written as {currency}"
                )));
            }
            if *exponent > MAX_MINOR_UNITS {
                return Err(ProrationError::ConfigError(format!(
                    "minor_units for {code} is {exponent}, maximum is {MAX_MINOR_UNITS}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the minor-unit exponent for `currency`, honoring overrides.
    #[must_use]
    pub fn scale_for(&self, currency: &Currency) -> u32 {
        self.minor_units.get(currency.code()).copied().unwrap_or_else(|| currency.minor_units())
    }
}

fn deserialize_minor_units<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HashMap<String, u32>, D::Error> {
    let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
    let mut normalized = HashMap::with_capacity(raw.len());
    for (code, exponent) in raw {
        let upper = code.to_ascii_uppercase();
        if normalized.insert(upper.clone(), exponent).is_some() {
            return Err(D::Error::custom(format!("minor_units lists {upper} more than once")));
        }
    }
    Ok(normalized)
}
