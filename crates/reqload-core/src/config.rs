// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Project config file looked up in the current directory
pub const CONFIG_FILE: &str = "reqload.toml";

/// Environment variable overriding [`EngineConfig::failure_policy`]
pub const FAILURE_POLICY_ENV: &str = "REQLOAD_FAILURE_POLICY";

/// What happens to a module whose factory returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the module in progress with its partial exports.
    /// Later requires return the partial exports without re-running it.
    #[default]
    Stuck,
    /// Reset the module so the next require runs its factory again
    Retry,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stuck" => Ok(FailurePolicy::Stuck),
            "retry" => Ok(FailurePolicy::Retry),
            other => Err(Error::ConfigValue {
                key: "failure_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Stuck => write!(f, "stuck"),
            FailurePolicy::Retry => write!(f, "retry"),
        }
    }
}

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Failure handling for module factories
    pub failure_policy: FailurePolicy,
}

impl EngineConfig {
    /// Load configuration from default locations.
    ///
    /// Defaults, then `reqload.toml` in the current directory, then the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut config = EngineConfig::default();

        let project = Path::new(CONFIG_FILE);
        if project.exists() {
            config = Self::from_file(project)?;
        }

        config.load_from_env()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML config text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    pub fn load_from_env(&mut self) -> Result<()> {
        if let Ok(policy) = std::env::var(FAILURE_POLICY_ENV) {
            self.apply_failure_policy(&policy)?;
        }
        Ok(())
    }

    fn apply_failure_policy(&mut self, raw: &str) -> Result<()> {
        self.failure_policy = raw.parse()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_stuck() {
        assert_eq!(EngineConfig::default().failure_policy, FailurePolicy::Stuck);
    }

    #[test]
    fn test_from_toml() {
        let config = EngineConfig::from_toml("failure_policy = \"retry\"").unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);

        let empty = EngineConfig::from_toml("").unwrap();
        assert_eq!(empty, EngineConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let err = EngineConfig::from_toml("failure_policy = \"explode\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "failure_policy = \"retry\"").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
    }

    #[test]
    fn test_from_missing_file() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/reqload.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigIo { .. }));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(" Retry ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Retry);
        assert_eq!("stuck".parse::<FailurePolicy>().unwrap(), FailurePolicy::Stuck);
        assert!("later".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Retry.to_string(), "retry");
    }

    #[test]
    fn test_apply_failure_policy() {
        let mut config = EngineConfig::default();
        config.apply_failure_policy("retry").unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
        assert!(config.apply_failure_policy("bogus").is_err());
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
    }

    // The only test in this crate that touches the environment
    #[test]
    fn test_env_overrides_config() {
        unsafe { std::env::set_var(FAILURE_POLICY_ENV, "RETRY") };

        let mut config = EngineConfig::from_toml("failure_policy = \"stuck\"").unwrap();
        config.load_from_env().unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
        assert_eq!(EngineConfig::load().unwrap().failure_policy, FailurePolicy::Retry);

        unsafe { std::env::set_var(FAILURE_POLICY_ENV, "sometimes") };
        let err = EngineConfig::default().load_from_env().unwrap_err();
        assert!(matches!(err, Error::ConfigValue { .. }));
        assert!(EngineConfig::load().is_err());

        unsafe { std::env::remove_var(FAILURE_POLICY_ENV) };
        let mut config = EngineConfig::from_toml("failure_policy = \"retry\"").unwrap();
        config.load_from_env().unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
        assert_eq!(EngineConfig::load().unwrap(), EngineConfig::default());
    }
}
