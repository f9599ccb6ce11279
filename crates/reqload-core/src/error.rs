// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for module engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while defining, requiring or configuring modules
#[derive(Debug, Error)]
pub enum Error {
    /// No module is registered under the canonical path
    #[error("required module {0} could not be found")]
    ModuleNotFound(String),

    /// A module factory reported a failure
    #[error("module '{module}' failed: {message}")]
    Factory {
        /// Canonical path of the failing module, empty when raised outside one
        module: String,
        /// Failure description
        message: String,
    },

    /// A native function exported by a module was called with bad arguments
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reading a configuration file failed
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for the expected shape
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is out of range
    #[error("invalid config value for {key}: '{value}'")]
    ConfigValue {
        /// Offending key
        key: String,
        /// Offending value
        value: String,
    },
}

impl Error {
    /// Create a module not found error
    pub fn module_not_found(path: impl Into<String>) -> Self {
        Self::ModuleNotFound(path.into())
    }

    /// Create a factory failure attributed to a module
    pub fn factory(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Factory {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Create a factory failure without a module attribution
    pub fn msg(message: impl Into<String>) -> Self {
        Self::factory(String::new(), message)
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Returns the missing canonical path if this is a not-found error
    pub fn missing_module(&self) -> Option<&str> {
        match self {
            Self::ModuleNotFound(path) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_path() {
        let err = Error::module_not_found("data/core");
        assert_eq!(
            err.to_string(),
            "required module data/core could not be found"
        );
        assert_eq!(err.missing_module(), Some("data/core"));
    }

    #[test]
    fn test_factory_message() {
        let err = Error::factory("app", "boom");
        assert_eq!(err.to_string(), "module 'app' failed: boom");
        assert_eq!(err.missing_module(), None);
    }
}
