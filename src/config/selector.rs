//! Engine selection settings

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::EngineKind;
use crate::engine::{EngineSelector, Fallback};

/// Declared-type routing configuration.
///
/// When `extensions` is empty the built-in table applies (mobile packages →
/// static-scan + reputation, detonatable Windows types → sandbox +
/// reputation); a non-empty table replaces the built-in one entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorSettings {
    /// Extension → engine list, e.g. `exe = ["sandbox", "reputation"]`
    #[serde(default)]
    pub extensions: BTreeMap<String, BTreeSet<EngineKind>>,

    /// What to do with declared types absent from the table
    #[serde(default)]
    pub fallback: Option<Fallback>,
}

impl SelectorSettings {
    /// Build the selector this configuration describes
    pub fn build(&self) -> EngineSelector {
        let fallback = self.fallback.unwrap_or(Fallback::All);
        if self.extensions.is_empty() {
            let default = EngineSelector::default();
            if self.fallback.is_none() {
                return default;
            }
            // Keep the built-in table, override only the fallback
            return EngineSelector::with_fallback(default, fallback);
        }
        EngineSelector::new(self.extensions.clone(), fallback)
    }
}
