use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskAssignment;

/// Catalog action type that declares a combination rule.
pub const COMBINE_ACTION_TYPE: &str = "combine";

/// Snapshot of the externally discovered task catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCatalog {
    /// Known primitive task keys and their opaque descriptors.
    #[serde(default)]
    pub tasks: BTreeMap<String, Value>,
    /// Catalog actions; only `combine` actions affect task resolution.
    #[serde(default)]
    pub actions: Vec<CatalogAction>,
}

/// One catalog action entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAction {
    /// Action type, for example `combine`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Output key produced by the action.
    #[serde(default)]
    pub output: Option<String>,
    /// Input keys consumed by the action.
    #[serde(default)]
    pub input: Vec<String>,
}

/// Rule combining primitive ingredient keys into one composite output key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationRule<'a> {
    /// Composite key produced by the rule.
    pub output: &'a str,
    /// Ingredient keys consumed by the rule.
    pub inputs: &'a [String],
}

/// Task descriptors one worker must process on a granted tick.
pub type ResolvedTasks = BTreeMap<String, Value>;

impl TaskCatalog {
    /// Returns every combination rule declared in the catalog.
    pub fn combination_rules(&self) -> impl Iterator<Item = CombinationRule<'_>> {
        self.actions
            .iter()
            .filter(|action| action.action_type == COMBINE_ACTION_TYPE)
            .filter_map(|action| {
                action.output.as_deref().map(|output| CombinationRule {
                    output,
                    inputs: action.input.as_slice(),
                })
            })
    }

    /// Returns the union of ingredient keys across rules producing `output`.
    #[must_use]
    pub fn combination_inputs(&self, output: &str) -> BTreeSet<&str> {
        self.combination_rules()
            .filter(|rule| rule.output == output)
            .flat_map(|rule| rule.inputs.iter().map(String::as_str))
            .collect()
    }

    /// Resolves the tasks an assignment covers in this catalog.
    ///
    /// Ingredients missing from the catalog are skipped silently; an empty
    /// result means the assignment is no longer available.
    #[must_use]
    pub fn resolve(&self, assignment: &TaskAssignment) -> ResolvedTasks {
        let key = assignment.key().as_str();
        let wanted: BTreeSet<&str> = if assignment.is_composite() {
            self.combination_inputs(key)
        } else {
            BTreeSet::from([key])
        };

        wanted
            .into_iter()
            .filter_map(|name| {
                self.tasks
                    .get(name)
                    .map(|descriptor| (name.to_owned(), descriptor.clone()))
            })
            .collect()
    }
}
