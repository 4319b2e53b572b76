//! Label selectors scoping orchestrator queries to one logical cluster
//!
//! Every selector carries the constant managed-by constraint so that list
//! and delete calls can never touch orchestrator objects dasklink does not
//! own.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::identity::FunctionIdentity;

/// Label marking every object dasklink manages
pub const CLASS_LABEL: &str = "dasklink.io/class";

/// Value of the managed-by label for dask-style clusters
pub const CLASS_VALUE: &str = "dask";

/// Label carrying the owning project
pub const PROJECT_LABEL: &str = "dasklink.io/project";

/// Label carrying the function name
pub const FUNCTION_LABEL: &str = "dasklink.io/function";

/// Label carrying the function tag
pub const TAG_LABEL: &str = "dasklink.io/tag";

/// An immutable set of label constraints plus an optional namespace
///
/// Constraints are kept sorted, so two selectors built from the same
/// logical identity render identically no matter the insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    constraints: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

impl Selector {
    /// A selector matching everything dasklink manages
    pub fn new() -> Self {
        let mut constraints = BTreeMap::new();
        constraints.insert(CLASS_LABEL.to_string(), CLASS_VALUE.to_string());
        Self {
            constraints,
            namespace: None,
        }
    }

    /// The canonical selector for one logical cluster identity
    ///
    /// Empty identity fields are omitted rather than rendered as `key=`.
    pub fn for_function(identity: &FunctionIdentity) -> Self {
        let mut selector = Self::new();
        if !identity.project.is_empty() {
            selector = selector.with_constraint(PROJECT_LABEL, &identity.project);
        }
        if !identity.name.is_empty() {
            selector = selector.with_constraint(FUNCTION_LABEL, &identity.name);
        }
        if !identity.tag.is_empty() {
            selector = selector.with_constraint(TAG_LABEL, &identity.tag);
        }
        selector
    }

    /// Add a `key=value` constraint
    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    /// Scope the selector to a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Render the comma-joined label-match expression
    pub fn to_label_selector(&self) -> String {
        self.constraints
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Check if a label set satisfies every constraint
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.constraints
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }

    /// The constraints as a plain label map, used to stamp owned objects
    pub fn to_labels(&self) -> HashMap<String, String> {
        self.constraints
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_carries_class_constraint() {
        let selector = Selector::new();
        assert_eq!(selector.to_label_selector(), "dasklink.io/class=dask");
    }

    #[test]
    fn test_for_function_renders_all_fields() {
        let identity = FunctionIdentity::new("trainer", "ml", "v1");
        let selector = Selector::for_function(&identity);
        assert_eq!(
            selector.to_label_selector(),
            "dasklink.io/class=dask,dasklink.io/function=trainer,\
             dasklink.io/project=ml,dasklink.io/tag=v1"
        );
    }

    #[test]
    fn test_order_independent() {
        let forward = Selector::new()
            .with_constraint(PROJECT_LABEL, "ml")
            .with_constraint(FUNCTION_LABEL, "trainer")
            .with_constraint(TAG_LABEL, "v1");
        let reverse = Selector::new()
            .with_constraint(TAG_LABEL, "v1")
            .with_constraint(FUNCTION_LABEL, "trainer")
            .with_constraint(PROJECT_LABEL, "ml");

        assert_eq!(forward.to_label_selector(), reverse.to_label_selector());
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_empty_fields_omitted() {
        let identity = FunctionIdentity::new("trainer", "ml", "");
        let selector = Selector::for_function(&identity);
        let rendered = selector.to_label_selector();
        assert!(!rendered.contains("tag"));
        assert!(rendered.contains("dasklink.io/function=trainer"));
    }

    #[test]
    fn test_matches_requires_every_constraint() {
        let identity = FunctionIdentity::new("trainer", "ml", "v1");
        let selector = Selector::for_function(&identity);

        let mut labels = selector.to_labels();
        labels.insert("unrelated".to_string(), "x".to_string());
        assert!(selector.matches(&labels));

        labels.remove(CLASS_LABEL);
        assert!(!selector.matches(&labels));
    }

    #[test]
    fn test_namespace_scope() {
        let selector = Selector::new().in_namespace("runs");
        assert_eq!(selector.namespace(), Some("runs"));
    }
}
