//! Reusable part templates.
//!
//! A template is a named, immutable construction graph with declared input
//! parameters (each carrying a default expression) and declared cumulative
//! selections. Selections get sequenced `cselN` ids in declaration order;
//! operations reference them by id, and builders resolve the human-readable
//! labels.

use std::collections::HashMap;

use crate::error::{BuildError, Result};
use crate::expr::Expr;
use crate::graph::Operation;
use crate::ids::IdTable;

/// A declared template input with its default expression.
#[derive(Debug, Clone)]
pub struct InputParam {
    pub name: String,
    pub default: Expr,
    pub default_text: String,
}

/// A declared cumulative selection.
#[derive(Debug, Clone)]
pub struct SelectionDecl {
    /// Sequenced id (`csel1`, `csel2`, …) used as the registry key.
    pub id: String,
    /// Human-readable label (`"CUFF FINAL"`).
    pub label: String,
    /// Non-contributing selections hold auxiliary construction geometry and
    /// default to dropped when an instance clears the keep flag.
    pub contributing: bool,
}

/// An immutable part template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    inputs: Vec<InputParam>,
    selections: Vec<SelectionDecl>,
    ops: Vec<Operation>,
}

impl Template {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn inputs(&self) -> &[InputParam] {
        &self.inputs
    }

    #[must_use]
    pub fn selections(&self) -> &[SelectionDecl] {
        &self.selections
    }

    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Looks up a declared input by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputParam> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Resolves a selection label to its `cselN` id.
    #[must_use]
    pub fn selection_id(&self, label: &str) -> Option<&str> {
        self.selections
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.id.as_str())
    }

    /// Looks up a selection declaration by id.
    #[must_use]
    pub fn selection(&self, id: &str) -> Option<&SelectionDecl> {
        self.selections.iter().find(|s| s.id == id)
    }
}

/// Builds a [`Template`] in declaration order.
#[derive(Debug)]
pub struct TemplateBuilder {
    name: String,
    inputs: Vec<InputParam>,
    selections: Vec<SelectionDecl>,
    ops: Vec<Operation>,
    ids: IdTable,
}

impl TemplateBuilder {
    /// Starts a template definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            selections: Vec::new(),
            ops: Vec::new(),
            ids: IdTable::new(),
        }
    }

    /// Declares an input parameter with a default expression.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the default expression is malformed.
    pub fn input(&mut self, name: &str, default: &str) -> Result<&mut Self> {
        let parsed = Expr::parse(default)?;
        self.inputs.push(InputParam {
            name: name.to_string(),
            default: parsed,
            default_text: default.to_string(),
        });
        Ok(self)
    }

    /// Declares a contributing cumulative selection, allocating its `cselN`
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateSelectionLabel`] if the label is
    /// already declared.
    pub fn selection(&mut self, label: &str) -> Result<String> {
        self.declare_selection(label, true)
    }

    /// Declares a non-contributing selection (auxiliary construction
    /// geometry an instance may drop wholesale).
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateSelectionLabel`] if the label is
    /// already declared.
    pub fn selection_non_contributing(&mut self, label: &str) -> Result<String> {
        self.declare_selection(label, false)
    }

    fn declare_selection(&mut self, label: &str, contributing: bool) -> Result<String> {
        let Some(id) = self.ids.next_labeled("csel", label) else {
            return Err(BuildError::DuplicateSelectionLabel {
                template: self.name.clone(),
                label: label.to_string(),
            }
            .into());
        };
        self.selections.push(SelectionDecl {
            id: id.clone(),
            label: label.to_string(),
            contributing,
        });
        Ok(id)
    }

    /// Resolves a previously declared selection label to its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SelectionError::UnknownSelection`] if the
    /// label was never declared.
    pub fn sel(&self, label: &str) -> Result<String> {
        self.ids.get(label).map(str::to_string).ok_or_else(|| {
            crate::error::SelectionError::UnknownSelection {
                name: label.to_string(),
            }
            .into()
        })
    }

    /// Parses an expression string (convenience for operation parameters).
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed input.
    pub fn expr(&self, text: &str) -> Result<Expr> {
        Ok(Expr::parse(text)?)
    }

    /// Appends an operation.
    pub fn push(&mut self, op: Operation) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Finishes the template. The result is immutable.
    #[must_use]
    pub fn build(self) -> Template {
        Template {
            name: self.name,
            inputs: self.inputs,
            selections: self.selections,
            ops: self.ops,
        }
    }
}

/// Registry of part templates, immutable after the initialization phase.
#[derive(Debug, Default)]
pub struct TemplateTable {
    templates: HashMap<String, Template>,
}

impl TemplateTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateTemplate`] if the name is taken.
    pub fn register(&mut self, template: Template) -> Result<()> {
        if self.templates.contains_key(template.name()) {
            return Err(BuildError::DuplicateTemplate {
                template: template.name().to_string(),
            }
            .into());
        }
        self.templates.insert(template.name().to_string(), template);
        Ok(())
    }

    /// Pure lookup.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownTemplate`] if absent.
    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| BuildError::UnknownTemplate(name.to_string()).into())
    }

    /// Registered template names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn selection_ids_follow_declaration_order() {
        let mut b = TemplateBuilder::new("T");
        assert_eq!(b.selection("FIRST").unwrap(), "csel1");
        assert_eq!(b.selection("SECOND").unwrap(), "csel2");
        assert_eq!(b.selection("THIRD").unwrap(), "csel3");
        assert_eq!(b.sel("THIRD").unwrap(), "csel3");
        let t = b.build();
        assert_eq!(t.selection_id("THIRD"), Some("csel3"));
        assert!(t.selection("csel2").unwrap().contributing);
    }

    #[test]
    fn duplicate_selection_label_rejected() {
        let mut b = TemplateBuilder::new("T");
        b.selection("SRC").unwrap();
        assert!(b.selection("SRC").is_err());
    }

    #[test]
    fn inputs_carry_default_expressions() {
        let mut b = TemplateBuilder::new("T");
        b.input("Theta", "340 [deg]").unwrap();
        let t = b.build();
        assert!(t.input("Theta").is_some());
        assert_eq!(t.input("Theta").unwrap().default_text, "340 [deg]");
        assert!(t.input("Nope").is_none());
    }

    #[test]
    fn table_rejects_duplicates_and_reports_unknown() {
        let mut table = TemplateTable::new();
        table.register(TemplateBuilder::new("A").build()).unwrap();
        assert!(table.register(TemplateBuilder::new("A").build()).is_err());
        assert!(table.get("B").is_err());
        assert!(table.get("A").is_ok());
    }
}
