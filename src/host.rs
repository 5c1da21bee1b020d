//! Host interface: the expander's window onto the outside world.
//!
//! The engine itself has no name table. Every variable reference and
//! function call in an expression is dispatched, by exact byte-equal name,
//! to a [`Host`] supplied by the caller. Running without a host is fine as
//! long as the template never names anything.

use std::collections::HashMap;

use crate::value::Value;

/// Resolver for variable and function names, consulted at evaluation time.
///
/// The engine never caches results across calls; a host is free to return a
/// different value each time (a counter, a clock, a row cursor).
pub trait Host {
    /// Look up a variable. `None` means the name is not defined, which
    /// fails the expression.
    fn get_variable(&mut self, name: &str) -> Option<Value>;

    /// Invoke a function with already-evaluated arguments (never empty).
    /// The `Err` reason is folded into the expression diagnostic.
    fn exec_function(&mut self, name: &str, args: &[Value]) -> Result<Value, String>;
}

/// Boxed function callback stored by [`MapHost`].
pub type HostFn = Box<dyn FnMut(&[Value]) -> Result<Value, String>>;

/// A ready-made [`Host`] backed by name-keyed maps.
///
/// ```rust
/// use weft::{MapHost, Value};
///
/// let mut host = MapHost::new()
///     .var("port", 8080)
///     .func("succ", |args| match args[0] {
///         Value::Int(n) => Ok(Value::Int(n + 1)),
///         _ => Err("expected a number".into()),
///     });
/// let out = weft::run(Some(&mut host), "port `port`, next `succ(port)`").unwrap();
/// assert_eq!(out, vec!["port 8080, next 8081"]);
/// ```
#[derive(Default)]
pub struct MapHost {
    vars: HashMap<String, Value>,
    funcs: HashMap<String, HostFn>,
}

impl MapHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable (builder form).
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Register a function (builder form).
    pub fn func<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&[Value]) -> Result<Value, String> + 'static,
    {
        self.funcs.insert(name.into(), Box::new(f));
        self
    }

    /// Insert or replace a variable in place.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl Host for MapHost {
    fn get_variable(&mut self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    fn exec_function(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        match self.funcs.get_mut(name) {
            Some(f) => f(args),
            None => Err(format!("function '{name}' is not defined")),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
