// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # reqload-core
//!
//! A lazy, memoizing module engine. Modules are registered with [`Registry::define`]
//! and executed on their first [`Registry::require`]; every later require
//! returns the same [`Exports`] object.
//!
//! - Factories run at most once, and only when required
//! - Definitions may arrive in any order, as long as they all arrive before
//!   the require that needs them
//! - References are resolved relative to the requiring module (`./x`, `../x`)
//! - Circular requires return the in-progress exports instead of recursing
//!
//! ## Quick Start
//!
//! ```
//! use reqload_core::{Registry, Value};
//!
//! let registry = Registry::new();
//! registry.define("math", |exports, _require| {
//!     exports.set(
//!         "add",
//!         Value::function("add", |args| {
//!             let a = args[0].as_number().unwrap_or(0.0);
//!             let b = args[1].as_number().unwrap_or(0.0);
//!             Ok(Value::Number(a + b))
//!         }),
//!     );
//!     Ok(())
//! });
//!
//! let math = registry.require("math")?;
//! assert_eq!(math.call("add", &[2.0.into(), 3.0.into()])?, Value::Number(5.0));
//! # Ok::<(), reqload_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod value;

// Re-exports
pub use config::{EngineConfig, FailurePolicy};
pub use error::{Error, Result};
pub use registry::{FactoryFn, Registry, Require, Status};
pub use resolver::{is_relative, resolve};
pub use value::{Exports, Function, Value};

/// Version of the reqload engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

thread_local! {
    static DEFAULT_REGISTRY: Registry = Registry::new();
}

/// The registry behind [`define`] and [`require`] on the current thread
pub fn default_registry() -> Registry {
    DEFAULT_REGISTRY.with(Registry::clone)
}

/// Register a module in the default registry
pub fn define<F>(path: impl Into<String>, factory: F) -> bool
where
    F: Fn(&Exports, &Require) -> Result<()> + 'static,
{
    default_registry().define(path, factory)
}

/// Require a module from the default registry
pub fn require(path: &str) -> Result<Exports> {
    default_registry().require(path)
}
