//! Expression parameter store.
//!
//! Named symbolic parameters grouped by namespace, one group per device
//! family plus a shared `"global"` group. Expressions may reference other
//! parameters; resolution substitutes names transitively and rejects cycles.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ParamError, Result};
use crate::expr::{EvalContext, Expr, Quantity};

/// Name of the group searched after a parameter's own group.
pub const GLOBAL_GROUP: &str = "global";

/// A named symbolic parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub expr: Expr,
    pub expr_text: String,
    pub description: String,
}

/// Grouped parameter definitions with recursive resolution.
#[derive(Debug, Default)]
pub struct ParameterStore {
    groups: HashMap<String, HashMap<String, Parameter>>,
}

impl ParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a parameter in a group.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::DuplicateParameter`] if `name` already exists in
    /// `group`, or a parse error if the expression is malformed.
    pub fn define(&mut self, group: &str, name: &str, expr: &str, description: &str) -> Result<()> {
        let entries = self.groups.entry(group.to_string()).or_default();
        if entries.contains_key(name) {
            return Err(ParamError::DuplicateParameter {
                group: group.to_string(),
                name: name.to_string(),
            }
            .into());
        }
        let parsed = Expr::parse(expr)?;
        debug!(group, name, expr, "define parameter");
        entries.insert(
            name.to_string(),
            Parameter {
                name: name.to_string(),
                expr: parsed,
                expr_text: expr.to_string(),
                description: description.to_string(),
            },
        );
        Ok(())
    }

    /// Looks up a parameter definition without evaluating it, searching the
    /// group first and then the global group.
    #[must_use]
    pub fn lookup(&self, group: &str, name: &str) -> Option<&Parameter> {
        self.groups
            .get(group)
            .and_then(|g| g.get(name))
            .or_else(|| self.groups.get(GLOBAL_GROUP).and_then(|g| g.get(name)))
    }

    /// Evaluates a parameter to a numeric quantity.
    ///
    /// Pure query: the store is not mutated and repeated calls return
    /// identical results.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::UnresolvedReference`] for names found in neither
    /// the group nor the global scope, and [`ParamError::CyclicDependency`]
    /// if resolution re-enters a name already being resolved.
    pub fn resolve(&self, group: &str, name: &str) -> Result<Quantity> {
        let mut resolver = Resolver {
            store: self,
            group,
            stack: Vec::new(),
        };
        resolver.resolve(name)
    }

    /// Evaluates a free-standing expression in a group's namespace.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ParameterStore::resolve`].
    pub fn eval_in(&self, group: &str, expr: &Expr) -> Result<Quantity> {
        let mut resolver = Resolver {
            store: self,
            group,
            stack: Vec::new(),
        };
        expr.eval(&mut resolver)
    }
}

/// Recursive resolver with a visiting stack for cycle detection.
struct Resolver<'a> {
    store: &'a ParameterStore,
    group: &'a str,
    stack: Vec<String>,
}

impl EvalContext for Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Quantity> {
        if self.stack.iter().any(|n| n == name) {
            let mut path = self.stack.join(" -> ");
            path.push_str(" -> ");
            path.push_str(name);
            return Err(ParamError::CyclicDependency { path }.into());
        }
        let param = self.store.lookup(self.group, name).ok_or_else(|| {
            ParamError::UnresolvedReference {
                name: name.to_string(),
            }
        })?;
        self.stack.push(name.to_string());
        let result = param.expr.eval(self);
        self.stack.pop();
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use crate::error::{ParamError, PartforgeError};
    use crate::expr::Dim;

    use super::*;

    #[test]
    fn resolve_follows_references() {
        let mut store = ParameterStore::new();
        store.define("cuff", "R_in", "1 [mm]", "inner radius").unwrap();
        store.define("cuff", "R_out", "2*R_in", "outer radius").unwrap();
        let q = store.resolve("cuff", "R_out").unwrap();
        assert_relative_eq!(q.value, 2000.0);
        assert_eq!(q.dim, Dim::LENGTH);
    }

    #[test]
    fn duplicate_in_same_group_rejected() {
        let mut store = ParameterStore::new();
        store.define("cuff", "L", "5 [mm]", "").unwrap();
        let err = store.define("cuff", "L", "6 [mm]", "").unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Param(ParamError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn same_name_in_other_group_is_fine() {
        let mut store = ParameterStore::new();
        store.define("a", "L", "5 [mm]", "").unwrap();
        store.define("b", "L", "9 [mm]", "").unwrap();
        assert_relative_eq!(store.resolve("a", "L").unwrap().value, 5000.0);
        assert_relative_eq!(store.resolve("b", "L").unwrap().value, 9000.0);
    }

    #[test]
    fn global_group_is_the_fallback_scope() {
        let mut store = ParameterStore::new();
        store.define(GLOBAL_GROUP, "k", "3", "").unwrap();
        store.define("cuff", "L", "k * 1 [mm]", "").unwrap();
        assert_relative_eq!(store.resolve("cuff", "L").unwrap().value, 3000.0);
    }

    #[test]
    fn group_shadows_global() {
        let mut store = ParameterStore::new();
        store.define(GLOBAL_GROUP, "k", "3", "").unwrap();
        store.define("cuff", "k", "7", "").unwrap();
        store.define("cuff", "L", "k * 1 [mm]", "").unwrap();
        assert_relative_eq!(store.resolve("cuff", "L").unwrap().value, 7000.0);
    }

    #[test]
    fn unknown_reference_reports_the_name() {
        let mut store = ParameterStore::new();
        store.define("cuff", "L", "Missing + 1", "").unwrap();
        let err = store.resolve("cuff", "L").unwrap_err();
        let PartforgeError::Param(ParamError::UnresolvedReference { name }) = err else {
            panic!("wrong error: {err}");
        };
        assert_eq!(name, "Missing");
    }

    #[test]
    fn cycle_is_detected_with_path() {
        let mut store = ParameterStore::new();
        store.define("g", "a", "b+1", "").unwrap();
        store.define("g", "b", "a+1", "").unwrap();
        let err = store.resolve("g", "a").unwrap_err();
        let PartforgeError::Param(ParamError::CyclicDependency { path }) = err else {
            panic!("wrong error: {err}");
        };
        assert!(path.contains("a -> b -> a"));
    }

    #[test]
    fn resolve_is_deterministic() {
        let mut store = ParameterStore::new();
        store.define("g", "x", "sin(45 [deg]) * 10 [mm]", "").unwrap();
        let a = store.resolve("g", "x").unwrap();
        let b = store.resolve("g", "x").unwrap();
        assert_eq!(a, b);
    }
}
