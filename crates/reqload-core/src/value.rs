// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Export values and the shared exports handle

use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Signature of a native function stored in an exports object
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value>;

/// A function value exported by a module.
///
/// Clones share the same underlying closure, so identity survives copying
/// the value out of an exports object.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl Function {
    /// Wrap a closure as a named function value
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    /// The name the function was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    /// Returns true if both values wrap the same closure
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// A value stored in a module's exports.
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Bool(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Native function
    Function(Function),
    /// Another exports handle, typically a required module
    Object(Exports),
    /// Host data the engine does not interpret
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Wrap a closure as a function value
    pub fn function<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Value::Function(Function::new(name, func))
    }

    /// Wrap arbitrary host data
    pub fn opaque<T: Any>(value: T) -> Self {
        Value::Opaque(Rc::new(value))
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is a function.
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Number payload, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload, if any
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Function payload, if any
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Exports payload, if any
    pub fn as_object(&self) -> Option<&Exports> {
        match self {
            Value::Object(exports) => Some(exports),
            _ => None,
        }
    }

    /// Downcast opaque host data
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Opaque(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "[Function: {}]", func.name()),
            Value::Object(exports) => write!(f, "[Module: {} keys]", exports.len()),
            Value::Opaque(_) => write!(f, "[Opaque]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Exports> for Value {
    fn from(exports: Exports) -> Self {
        Value::Object(exports)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

/// The mutable object a module factory populates.
///
/// Cloning the handle does not copy the members: every clone refers to the
/// same storage, which is what lets a module observe another module's
/// exports while that module is still executing.
#[derive(Clone, Default)]
pub struct Exports {
    members: Rc<RefCell<IndexMap<String, Value>>>,
}

impl Exports {
    /// Create a fresh, empty exports object
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a member, returning the previous value
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.members.borrow_mut().insert(key.into(), value.into())
    }

    /// Get a member by name
    pub fn get(&self, key: &str) -> Option<Value> {
        self.members.borrow().get(key).cloned()
    }

    /// Check if a member exists
    pub fn contains(&self, key: &str) -> bool {
        self.members.borrow().contains_key(key)
    }

    /// Remove a member
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.members.borrow_mut().shift_remove(key)
    }

    /// Remove every member, keeping this handle's identity
    pub fn clear(&self) {
        // Members are dropped after the borrow is released
        let members = std::mem::take(&mut *self.members.borrow_mut());
        drop(members);
    }

    /// Member names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.members.borrow().keys().cloned().collect()
    }

    /// Snapshot of all members in insertion order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.members
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Check if no members have been set
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Call an exported function by name.
    ///
    /// The member is cloned out before the call, so the function may itself
    /// read or write this exports object.
    pub fn call(&self, key: &str, args: &[Value]) -> Result<Value> {
        match self.get(key) {
            Some(Value::Function(func)) => func.call(args),
            Some(other) => Err(Error::type_error(format!(
                "{} is not a function (got {})",
                key,
                other.type_of()
            ))),
            None => Err(Error::type_error(format!("{} is not a function", key))),
        }
    }

    /// Returns true if both handles refer to the same exports object
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.members, &other.members)
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Members may contain this object again through a cycle, so only keys are shown
        f.debug_struct("Exports").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_members() {
        let a = Exports::new();
        let b = a.clone();
        b.set("x", 1i64);
        assert_eq!(a.get("x"), Some(Value::Number(1.0)));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Exports::new()));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let exports = Exports::new();
        exports.set("z", true);
        exports.set("a", "first");
        exports.set("m", Value::Null);
        assert_eq!(exports.keys(), vec!["z", "a", "m"]);
        exports.remove("a");
        assert_eq!(exports.keys(), vec!["z", "m"]);
    }

    #[test]
    fn test_clear_keeps_identity() {
        let exports = Exports::new();
        let held = exports.clone();
        exports.set("x", 1i64);
        exports.clear();
        assert!(held.is_empty());
        held.set("y", true);
        assert!(exports.ptr_eq(&held));
        assert_eq!(exports.keys(), vec!["y"]);
    }

    #[test]
    fn test_call_function_member() {
        let exports = Exports::new();
        exports.set(
            "add",
            Value::function("add", |args| {
                let a = args.first().and_then(Value::as_number).unwrap_or(0.0);
                let b = args.get(1).and_then(Value::as_number).unwrap_or(0.0);
                Ok(Value::Number(a + b))
            }),
        );
        let sum = exports
            .call("add", &[Value::from(2i64), Value::from(3i64)])
            .unwrap();
        assert_eq!(sum, Value::Number(5.0));
    }

    #[test]
    fn test_call_non_function_is_type_error() {
        let exports = Exports::new();
        exports.set("name", "math");
        assert!(matches!(exports.call("name", &[]), Err(Error::TypeError(_))));
        assert!(matches!(exports.call("missing", &[]), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_function_identity_survives_clone() {
        let f = Function::new("f", |_| Ok(Value::Undefined));
        let v1 = Value::Function(f.clone());
        let v2 = Value::Function(f);
        assert_eq!(v1, v2);
        let other = Value::function("f", |_| Ok(Value::Undefined));
        assert_ne!(v1, other);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(
            Value::Array(vec![Value::from(1i64), Value::from("a")]).to_string(),
            "[1, \"a\"]"
        );
        assert_eq!(
            Value::function("add", |_| Ok(Value::Null)).to_string(),
            "[Function: add]"
        );
    }

    #[test]
    fn test_opaque_downcast() {
        let v = Value::opaque(42u32);
        assert_eq!(v.downcast_ref::<u32>(), Some(&42));
        assert_eq!(v.downcast_ref::<String>(), None);
        assert_eq!(v.type_of(), "object");
    }
}
