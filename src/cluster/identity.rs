//! Logical function identity
//!
//! A cluster belongs to one (name, project, tag) triple. The identity is
//! what selectors, persisted records and generated cluster names are all
//! derived from.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identity of a logical function owning a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionIdentity {
    /// Function name
    pub name: String,

    /// Project the function belongs to
    #[serde(default = "default_project")]
    pub project: String,

    /// Version tag, may be empty
    #[serde(default)]
    pub tag: String,
}

fn default_project() -> String {
    "default".to_string()
}

impl FunctionIdentity {
    pub fn new(
        name: impl Into<String>,
        project: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            tag: tag.into(),
        }
    }

    /// Identity in the default project with no tag
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, default_project(), "")
    }

    /// The function name normalized for use in orchestrator object names
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for FunctionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}/{}", self.project, self.name)
        } else {
            write!(f, "{}/{}:{}", self.project, self.name, self.tag)
        }
    }
}

/// Normalize a name for orchestrator object naming: lowercase, runs of
/// characters outside `[a-z0-9-]` collapse to a single `-`, no leading or
/// trailing `-`
pub fn normalize_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^a-z0-9-]+").expect("static pattern"));

    let lowered = name.to_lowercase();
    invalid
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
