// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declarative module manifests
//!
//! A manifest is a TOML file listing modules. Each module requires its
//! imports (in declaration order) into named members, then sets literal
//! exports:
//!
//! ```toml
//! [[module]]
//! path = "app/app"
//! imports = { data = "../data/core" }
//! exports = { name = "app", version = 2 }
//! ```
//!
//! Installing a manifest defines every module before anything is required.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use reqload_core::{Error, Exports, Registry, Value};
use serde::Deserialize;
use std::path::Path;

/// A parsed module manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Module definitions in file order
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,
}

/// One module definition
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSpec {
    /// Registration path, used verbatim
    pub path: String,
    /// Member name -> module reference, resolved relative to `path`
    #[serde(default)]
    pub imports: IndexMap<String, String>,
    /// Literal members
    #[serde(default)]
    pub exports: IndexMap<String, toml::Value>,
    /// If set, the factory fails with this message after populating its exports
    #[serde(default)]
    pub fail: Option<String>,
}

impl Manifest {
    /// Read and parse a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read manifest {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid manifest {}", path.display()))
    }

    /// Parse manifest text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Define every module in the registry; returns how many took effect
    pub fn install(&self, registry: &Registry) -> usize {
        let mut defined = 0;
        for spec in &self.modules {
            let spec = spec.clone();
            let path = spec.path.clone();
            if registry.define(path, move |exports, require| {
                for (member, reference) in &spec.imports {
                    let dep = require.call(reference)?;
                    exports.set(member.clone(), dep);
                }
                for (member, value) in &spec.exports {
                    exports.set(member.clone(), toml_to_value(value));
                }
                match &spec.fail {
                    Some(message) => Err(Error::factory(require.base(), message.clone())),
                    None => Ok(()),
                }
            }) {
                defined += 1;
            }
        }
        tracing::debug!(
            "Installed {} of {} manifest modules",
            defined,
            self.modules.len()
        );
        defined
    }
}

/// Convert a TOML literal into an export value
fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number(*i as f64),
        toml::Value::Float(f) => Value::Number(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => {
            let exports = Exports::new();
            for (key, value) in table {
                exports.set(key.clone(), toml_to_value(value));
            }
            Value::Object(exports)
        }
    }
}
