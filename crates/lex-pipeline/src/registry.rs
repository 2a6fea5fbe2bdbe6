//! Catalog of available filter kinds.
//!
//! Each entry maps a kind string to a factory, the kind's parameter schema,
//! its ordering constraints and whether it may appear more than once. The
//! built-in registry is created once per process and shared read-only.

use crate::error::RegistryError;
use crate::filters::{EncodeFilter, Filter, ImputeFilter, ParameterSchema, PcaFilter, ScaleFilter};
use crate::types::Severity;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Positional rule declared by a filter kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum OrderingConstraint {
    /// An enabled filter of `kind` must exist at an earlier position.
    After { kind: String, severity: Severity },
    /// No enabled filter of `kind` may exist at an earlier position.
    /// `kind` does not have to be present at all.
    Before { kind: String, severity: Severity },
    /// All columns must be numeric by the time this filter runs. Checked
    /// against the projected schema by data-aware validation.
    RequiresNumericInput,
}

impl OrderingConstraint {
    pub fn after(kind: &str, severity: Severity) -> Self {
        Self::After {
            kind: kind.to_string(),
            severity,
        }
    }

    pub fn before(kind: &str, severity: Severity) -> Self {
        Self::Before {
            kind: kind.to_string(),
            severity,
        }
    }
}

/// Produces a fresh filter instance.
pub type FilterFactory = fn() -> Box<dyn Filter>;

/// Factory for filters constructible with `Default`.
pub fn boxed<F: Filter + Default + 'static>() -> Box<dyn Filter> {
    Box::new(F::default())
}

/// One registered filter kind.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub kind: String,
    pub display_name: String,
    pub factory: FilterFactory,
    pub parameters: ParameterSchema,
    pub constraints: Vec<OrderingConstraint>,
    pub singleton: bool,
}

impl RegistryEntry {
    /// Describe a kind from its factory. Kind, display name and parameters
    /// are read from a sample instance.
    pub fn new(factory: FilterFactory) -> Self {
        let sample = factory();
        Self {
            kind: sample.kind().to_string(),
            display_name: sample.display_name().to_string(),
            factory,
            parameters: sample.declare_parameters(),
            constraints: Vec::new(),
            singleton: false,
        }
    }

    pub fn constraint(mut self, constraint: OrderingConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn create(&self) -> Box<dyn Filter> {
        (self.factory)()
    }

    pub fn requires_numeric_input(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, OrderingConstraint::RequiresNumericInput))
    }

    pub fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor {
            kind: self.kind.clone(),
            display_name: self.display_name.clone(),
            parameters: self.parameters.clone(),
            constraints: self.constraints.clone(),
            singleton: self.singleton,
        }
    }
}

/// What a UI needs to render a configuration form for one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub kind: String,
    pub display_name: String,
    pub parameters: ParameterSchema,
    pub constraints: Vec<OrderingConstraint>,
    pub singleton: bool,
}

/// Kind string to [`RegistryEntry`] mapping, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

static BUILTIN: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::builtin()));

impl Registry {
    /// An empty registry, for custom filter sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in kinds: impute, encode, scale, pca.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for entry in builtin_entries() {
            registry.push(entry);
        }
        registry
    }

    /// The process-wide built-in registry.
    pub fn shared() -> Arc<Registry> {
        Arc::clone(&BUILTIN)
    }

    /// Add a kind. Fails if the kind is already registered.
    pub fn register(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if self.index.contains_key(&entry.kind) {
            return Err(RegistryError::DuplicateFilterKind(entry.kind));
        }
        self.push(entry);
        Ok(())
    }

    fn push(&mut self, entry: RegistryEntry) {
        self.index.insert(entry.kind.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, kind: &str) -> Result<&RegistryEntry, RegistryError> {
        self.index
            .get(kind)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::UnknownFilterKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors of every kind, in registration order.
    pub fn list_kinds(&self) -> Vec<FilterDescriptor> {
        self.entries.iter().map(RegistryEntry::descriptor).collect()
    }
}

fn builtin_entries() -> Vec<RegistryEntry> {
    use OrderingConstraint as C;
    use Severity::{Error, Warning};

    vec![
        RegistryEntry::new(boxed::<ImputeFilter>)
            .constraint(C::before("encode", Warning))
            .constraint(C::before("scale", Warning))
            .constraint(C::before("pca", Warning)),
        RegistryEntry::new(boxed::<EncodeFilter>)
            .constraint(C::before("scale", Error))
            .constraint(C::before("pca", Error))
            .singleton(),
        RegistryEntry::new(boxed::<ScaleFilter>).constraint(C::before("pca", Error)),
        RegistryEntry::new(boxed::<PcaFilter>)
            .constraint(C::after("scale", Error))
            .constraint(C::RequiresNumericInput)
            .singleton(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_kinds_in_registration_order() {
        let kinds: Vec<String> = Registry::builtin()
            .list_kinds()
            .into_iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, vec!["impute", "encode", "scale", "pca"]);
    }

    #[test]
    fn test_lookup() {
        let registry = Registry::shared();
        let pca = registry.get("pca").unwrap();
        assert!(pca.singleton);
        assert!(pca.requires_numeric_input());
        assert_eq!(pca.create().kind(), "pca");

        assert_eq!(
            registry.get("tsne").unwrap_err(),
            RegistryError::UnknownFilterKind("tsne".to_string())
        );
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = Registry::builtin();
        let err = registry
            .register(RegistryEntry::new(boxed::<ScaleFilter>))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateFilterKind("scale".to_string()));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_descriptor_serializes_for_forms() {
        let registry = Registry::builtin();
        let json = serde_json::to_value(registry.list_kinds()).unwrap();
        let pca = &json[3];
        assert_eq!(pca["display_name"], "PCA Feature Extraction");
        assert_eq!(pca["parameters"]["parameters"][0]["name"], "n_components");
        assert_eq!(pca["parameters"]["parameters"][0]["default"], 5);
        assert_eq!(pca["constraints"][0]["rule"], "after");
        assert_eq!(pca["constraints"][0]["kind"], "scale");
    }
}
