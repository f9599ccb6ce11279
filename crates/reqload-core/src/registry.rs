// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry and executor
//!
//! `define` records a factory under a path. `require` resolves a reference,
//! runs the factory the first time the path is needed and hands out the same
//! exports object from then on.
//!
//! A module that is required again while its own factory is still running
//! (a cycle) gets the exports object in whatever state the factory has left
//! it so far. Members should be read when the requiring code actually runs,
//! not at module top level:
//!
//! ```
//! use reqload_core::{Registry, Value};
//!
//! let registry = Registry::new();
//! registry.define("data/dep", |exports, _require| {
//!     exports.set("info", "ready");
//!     Ok(())
//! });
//! registry.define("app", |exports, require| {
//!     let dep = require.call("data/dep")?;
//!     exports.set(
//!         "init",
//!         Value::function("init", move |_| Ok(dep.get("info").unwrap_or_default())),
//!     );
//!     Ok(())
//! });
//!
//! let app = registry.require("app").unwrap();
//! assert_eq!(app.call("init", &[]).unwrap(), Value::from("ready"));
//! ```

use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{Error, Result};
use crate::resolver;
use crate::value::Exports;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Signature of a module factory
pub type FactoryFn = dyn Fn(&Exports, &Require) -> Result<()>;

/// Execution status of a registered module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Defined but not run yet, or reset after a failure under the retry policy
    NotStarted,
    /// Factory is running, or failed and was left in place
    InProgress,
    /// Factory returned successfully
    Done,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NotStarted => write!(f, "not started"),
            Status::InProgress => write!(f, "in progress"),
            Status::Done => write!(f, "done"),
        }
    }
}

/// Execution state; the exports object exists once execution has begun
enum State {
    NotStarted,
    InProgress(Exports),
    Done(Exports),
    /// Failed under the retry policy; the emptied handle is reused on the next run
    Failed(Exports),
}

impl State {
    fn status(&self) -> Status {
        match self {
            State::NotStarted | State::Failed(_) => Status::NotStarted,
            State::InProgress(_) => Status::InProgress,
            State::Done(_) => Status::Done,
        }
    }

    fn exports(&self) -> Option<&Exports> {
        match self {
            State::NotStarted | State::Failed(_) => None,
            State::InProgress(exports) | State::Done(exports) => Some(exports),
        }
    }
}

/// Registered module
struct CacheEntry {
    factory: Rc<FactoryFn>,
    state: RefCell<State>,
}

struct Inner {
    config: EngineConfig,
    /// Canonical path to entry, in registration order
    entries: RefCell<IndexMap<String, Rc<CacheEntry>>>,
}

/// Module registry.
///
/// Cloning is cheap and every clone shares the same modules. The registry
/// is single-threaded: factories run inline on the caller's stack.
#[derive(Clone)]
pub struct Registry {
    inner: Rc<Inner>,
}

impl Registry {
    /// Create an empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                entries: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// The configuration this registry was built with
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register a module under `path`.
    ///
    /// The path is used exactly as given. Only the first definition of a path
    /// takes effect; later ones are ignored and `false` is returned. The
    /// factory is not run here.
    pub fn define<F>(&self, path: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&Exports, &Require) -> Result<()> + 'static,
    {
        let path = path.into();
        let mut entries = self.inner.entries.borrow_mut();
        if entries.contains_key(&path) {
            tracing::warn!("Module {} already defined, ignoring redefinition", path);
            return false;
        }

        tracing::debug!("Defining module {}", path);
        entries.insert(
            path,
            Rc::new(CacheEntry {
                factory: Rc::new(factory),
                state: RefCell::new(State::NotStarted),
            }),
        );
        true
    }

    /// Require a module from the top level
    pub fn require(&self, reference: &str) -> Result<Exports> {
        self.require_from(reference, "")
    }

    /// Require a module, resolving `reference` relative to `base`
    pub fn require_from(&self, reference: &str, base: &str) -> Result<Exports> {
        let path = resolver::resolve(reference, base);

        let entry = self.inner.entries.borrow().get(&path).cloned();
        let Some(entry) = entry else {
            if resolver::is_relative(reference) {
                tracing::warn!(
                    "Module {} not found (required as '{}' from '{}')",
                    path,
                    reference,
                    base
                );
            } else {
                tracing::warn!("Module {} not found", path);
            }
            return Err(Error::module_not_found(path));
        };

        let exports = {
            let mut state = entry.state.borrow_mut();
            if let Some(exports) = state.exports() {
                tracing::trace!("Module {} cache hit ({})", path, state.status());
                return Ok(exports.clone());
            }
            let exports = match &*state {
                State::Failed(previous) => previous.clone(),
                _ => Exports::new(),
            };
            *state = State::InProgress(exports.clone());
            exports
        };

        // No borrow is held while the factory runs, so it may define and require freely
        let require = Require {
            registry: self.clone(),
            base: path,
        };
        tracing::debug!("Executing module {}", require.base);
        let factory = Rc::clone(&entry.factory);

        match factory(&exports, &require) {
            Ok(()) => {
                *entry.state.borrow_mut() = State::Done(exports.clone());
                tracing::debug!("Module {} done", require.base);
                Ok(exports)
            }
            Err(err) => {
                match self.inner.config.failure_policy {
                    FailurePolicy::Stuck => {
                        tracing::warn!(
                            "Module {} failed and stays in progress: {}",
                            require.base,
                            err
                        );
                    }
                    FailurePolicy::Retry => {
                        tracing::warn!(
                            "Module {} failed and will run again on next require: {}",
                            require.base,
                            err
                        );
                        exports.clear();
                        *entry.state.borrow_mut() = State::Failed(exports);
                    }
                }
                Err(err)
            }
        }
    }

    /// Resolve a reference without looking it up or running anything
    pub fn resolve(&self, reference: &str, base: &str) -> String {
        resolver::resolve(reference, base)
    }

    /// Check if a module is defined under this exact path
    pub fn contains(&self, path: &str) -> bool {
        self.inner.entries.borrow().contains_key(path)
    }

    /// Execution status of the module at this exact path
    pub fn status(&self, path: &str) -> Option<Status> {
        self.inner
            .entries
            .borrow()
            .get(path)
            .map(|entry| entry.state.borrow().status())
    }

    /// Exports of a module whose execution has begun, without running anything
    pub fn peek(&self, path: &str) -> Option<Exports> {
        let entries = self.inner.entries.borrow();
        let entry = entries.get(path)?;
        let state = entry.state.borrow();
        state.exports().cloned()
    }

    /// All defined paths in registration order
    pub fn paths(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Number of defined modules
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Check if no modules are defined
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.entries.borrow();
        f.debug_map()
            .entries(
                entries
                    .iter()
                    .map(|(path, entry)| (path, entry.state.borrow().status())),
            )
            .finish()
    }
}

/// The require function handed to a running factory.
///
/// References are resolved relative to the path of the module that owns it.
#[derive(Clone)]
pub struct Require {
    registry: Registry,
    base: String,
}

impl Require {
    /// Require a module relative to the owning module
    pub fn call(&self, reference: &str) -> Result<Exports> {
        self.registry.require_from(reference, &self.base)
    }

    /// Resolve a reference relative to the owning module without requiring it
    pub fn resolve(&self, reference: &str) -> String {
        resolver::resolve(reference, &self.base)
    }

    /// Canonical path of the owning module
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The registry the owning module lives in
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Require {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Require").field("base", &self.base).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};

    fn counting(registry: &Registry, path: &str) -> Rc<Cell<usize>> {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        registry.define(path, move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        calls
    }

    #[test]
    fn test_define_does_not_execute() {
        let registry = Registry::new();
        let calls = counting(&registry, "x");
        assert_eq!(calls.get(), 0);
        assert_eq!(registry.status("x"), Some(Status::NotStarted));
        assert!(registry.peek("x").is_none());
    }

    #[test]
    fn test_define_reports_first_wins() {
        let registry = Registry::new();
        assert!(registry.define("x", |_, _| Ok(())));
        assert!(!registry.define("x", |_, _| Ok(())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_require_runs_once_and_marks_done() {
        let registry = Registry::new();
        let calls = counting(&registry, "x");
        let first = registry.require("x").unwrap();
        let second = registry.require("x").unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.status("x"), Some(Status::Done));
    }

    #[test]
    fn test_empty_factory_passes_through_in_progress() {
        let registry = Registry::new();
        let seen = Rc::new(Cell::new(None));
        let observed = Rc::clone(&seen);
        registry.define("empty", move |_, require| {
            observed.set(require.registry().status("empty"));
            Ok(())
        });
        registry.require("empty").unwrap();
        assert_eq!(seen.get(), Some(Status::InProgress));
        assert_eq!(registry.status("empty"), Some(Status::Done));
    }

    #[test]
    fn test_require_binds_base_to_module_path() {
        let registry = Registry::new();
        let base = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&base);
        registry.define("app/app", move |_, require| {
            *sink.borrow_mut() = require.base().to_string();
            assert_eq!(require.resolve("./core"), "app/core");
            Ok(())
        });
        registry.require("app/app").unwrap();
        assert_eq!(*base.borrow(), "app/app");
    }

    #[test]
    fn test_define_from_inside_factory() {
        let registry = Registry::new();
        registry.define("loader", |exports, require| {
            require.registry().define("late", |exports, _| {
                exports.set("ok", true);
                Ok(())
            });
            let late = require.call("late")?;
            exports.set("late", late);
            Ok(())
        });
        let loader = registry.require("loader").unwrap();
        let late = loader.get("late").unwrap();
        assert_eq!(late.as_object().unwrap().get("ok"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_not_found_carries_canonical_path() {
        let registry = Registry::new();
        registry.define("app/app", |_, require| {
            require.call("../missing/x")?;
            Ok(())
        });
        let err = registry.require("app/app").unwrap_err();
        assert_eq!(err.missing_module(), Some("missing/x"));
    }

    #[test]
    fn test_stuck_policy_keeps_partial_exports() {
        let registry = Registry::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        registry.define("bad", move |exports, _| {
            counter.set(counter.get() + 1);
            exports.set("half", 1i64);
            Err(Error::msg("boom"))
        });

        assert!(matches!(registry.require("bad"), Err(Error::Factory { .. })));
        assert_eq!(registry.status("bad"), Some(Status::InProgress));

        let partial = registry.require("bad").unwrap();
        assert_eq!(partial.get("half"), Some(Value::Number(1.0)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_policy_reruns_into_same_handle() {
        let registry = Registry::with_config(EngineConfig {
            failure_policy: FailurePolicy::Retry,
        });
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let first_run = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&first_run);
        registry.define("flaky", move |exports, _| {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                *sink.borrow_mut() = Some(exports.clone());
                exports.set("stale", true);
                return Err(Error::msg("first run fails"));
            }
            exports.set("fresh", true);
            Ok(())
        });

        assert!(registry.require("flaky").is_err());
        assert_eq!(registry.status("flaky"), Some(Status::NotStarted));
        assert!(registry.peek("flaky").is_none());
        let held = first_run.borrow().clone().unwrap();
        assert!(held.is_empty());

        let exports = registry.require("flaky").unwrap();
        assert!(exports.ptr_eq(&held));
        assert_eq!(exports.keys(), vec!["fresh"]);
        assert_eq!(calls.get(), 2);
        assert_eq!(registry.status("flaky"), Some(Status::Done));
    }

    #[test]
    fn test_retry_policy_keeps_handle_captured_in_cycle() {
        let registry = Registry::with_config(EngineConfig {
            failure_policy: FailurePolicy::Retry,
        });
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        registry.define("A", move |exports, require| {
            counter.set(counter.get() + 1);
            let b = require.call("B")?;
            exports.set("b", b);
            if counter.get() == 1 {
                return Err(Error::msg("first run fails"));
            }
            exports.set("ok", true);
            Ok(())
        });
        registry.define("B", |exports, require| {
            let a = require.call("A")?;
            exports.set("a", a);
            Ok(())
        });

        assert!(registry.require("A").is_err());
        assert_eq!(registry.status("B"), Some(Status::Done));

        let a = registry.require("A").unwrap();
        assert_eq!(runs.get(), 2);
        let b = registry.peek("B").unwrap();
        let a_from_b = b.get("a").unwrap();
        let a_from_b = a_from_b.as_object().unwrap();
        assert!(a_from_b.ptr_eq(&a));
        assert_eq!(a_from_b.get("ok"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_panic_leaves_entry_in_progress() {
        let registry = Registry::with_config(EngineConfig {
            failure_policy: FailurePolicy::Retry,
        });
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        registry.define("x", move |exports, _| {
            counter.set(counter.get() + 1);
            exports.set("half", true);
            panic!("factory panicked");
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.require("x")));
        assert!(outcome.is_err());
        assert_eq!(registry.status("x"), Some(Status::InProgress));

        let partial = registry.require("x").unwrap();
        assert_eq!(partial.keys(), vec!["half"]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_paths_in_registration_order() {
        let registry = Registry::new();
        registry.define("b", |_, _| Ok(()));
        registry.define("a", |_, _| Ok(()));
        registry.define("b", |_, _| Ok(()));
        assert_eq!(registry.paths(), vec!["b", "a"]);
        assert!(registry.contains("a"));
        assert!(!registry.contains("./a"));
    }

    #[test]
    fn test_clones_share_modules() {
        let registry = Registry::new();
        let other = registry.clone();
        other.define("shared", |_, _| Ok(()));
        assert!(registry.contains("shared"));
        assert!(Registry::new().is_empty());
    }

    #[test]
    fn test_debug_lists_statuses() {
        let registry = Registry::new();
        registry.define("x", |_, _| Ok(()));
        assert_eq!(format!("{:?}", registry), "{\"x\": NotStarted}");
    }
}
