use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ConfigError;

/// Where configuration variables are read from.
///
/// The process environment in production; a plain map in tests, so config
/// resolution never has to mutate global env state.
pub trait VarSource {
    fn var(&self, key: &str) -> Result<Option<String>, ConfigError>;
}

/// Reads from `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn var(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "value is not valid UTF-8".to_string(),
            }),
        }
    }
}

impl VarSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.get(key).cloned())
    }
}

/// Explicit values (e.g. command-line flags) in front of another source.
#[derive(Debug, Clone, Default)]
pub struct Layered<S> {
    overrides: HashMap<String, String>,
    fallback: S,
}

impl<S: VarSource> Layered<S> {
    pub fn new(fallback: S) -> Self {
        Self {
            overrides: HashMap::new(),
            fallback,
        }
    }

    /// Override `key` when `value` is present.
    pub fn set(mut self, key: &str, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.overrides.insert(key.to_string(), value.into());
        }
        self
    }
}

impl<S: VarSource> VarSource for Layered<S> {
    fn var(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.overrides.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.fallback.var(key),
        }
    }
}

/// Read an optional variable. Empty strings are treated as unset.
pub(crate) fn optional_env(
    source: &dyn VarSource,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    Ok(source.var(key)?.filter(|v| !v.trim().is_empty()))
}

/// Parse an optional variable, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(
    source: &dyn VarSource,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(source, key)?
        .map(|s| s.trim().parse::<T>())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
        .map(|v| v.unwrap_or(default))
}
