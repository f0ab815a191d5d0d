//! Engine selection: declared type → set of applicable engines.
//!
//! Selection is a pure, total function over declared types. Known types map
//! through a configurable table; unknown types hit an explicit fallback
//! policy - routing to every engine, or an explicit unsupported outcome.
//! Either way the answer is deterministic, never an accident of table order.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::{DeclaredType, EngineKind};

/// Mobile packages go to the static analyzer (plus reputation)
const MOBILE_EXTENSIONS: &[&str] = &["apk", "xapk", "ipa", "appx"];

/// Windows executables and scripts go to the sandbox (plus reputation)
const DETONATABLE_EXTENSIONS: &[&str] = &[
    "exe", "dll", "bin", "msi", "scr", "com", "bat", "cmd", "vbs", "jar",
];

/// Built-in routing table, shared by every default-policy selector
static DEFAULT_TABLE: Lazy<BTreeMap<String, BTreeSet<EngineKind>>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    for ext in MOBILE_EXTENSIONS {
        table.insert(
            ext.to_string(),
            BTreeSet::from([EngineKind::StaticScan, EngineKind::Reputation]),
        );
    }
    for ext in DETONATABLE_EXTENSIONS {
        table.insert(
            ext.to_string(),
            BTreeSet::from([EngineKind::Sandbox, EngineKind::Reputation]),
        );
    }
    table
});

/// Policy for declared types absent from the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Route unknown types to every engine
    All,
    /// Refuse unknown types outright
    Unsupported,
}

/// Outcome of selecting engines for a declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Non-empty set of engines to submit to
    Engines(BTreeSet<EngineKind>),
    /// This declared type is not analyzable under the current policy
    Unsupported,
}

impl Selection {
    pub fn engines(&self) -> Option<&BTreeSet<EngineKind>> {
        match self {
            Selection::Engines(set) => Some(set),
            Selection::Unsupported => None,
        }
    }
}

/// Maps declared types to engine sets
#[derive(Debug, Clone)]
pub struct EngineSelector {
    table: BTreeMap<String, BTreeSet<EngineKind>>,
    fallback: Fallback,
}

impl EngineSelector {
    /// Build a selector from an explicit table and fallback policy.
    /// Empty engine sets in the table are dropped: a mapped type always
    /// maps to a non-empty set.
    pub fn new(table: BTreeMap<String, BTreeSet<EngineKind>>, fallback: Fallback) -> Self {
        let table = table
            .into_iter()
            .map(|(ext, set)| (DeclaredType::new(&ext).as_str().to_string(), set))
            .filter(|(_, set)| !set.is_empty())
            .collect();
        Self { table, fallback }
    }

    /// Select the engines applicable to a declared type
    pub fn select(&self, declared: &DeclaredType) -> Selection {
        if let Some(set) = self.table.get(declared.as_str()) {
            return Selection::Engines(set.clone());
        }
        match self.fallback {
            Fallback::All => Selection::Engines(EngineKind::ALL.into_iter().collect()),
            Fallback::Unsupported => Selection::Unsupported,
        }
    }

    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Same table, different fallback policy
    pub fn with_fallback(base: EngineSelector, fallback: Fallback) -> Self {
        Self {
            table: base.table,
            fallback,
        }
    }
}

impl Default for EngineSelector {
    /// The built-in policy: mobile packages → static-scan + reputation,
    /// detonatable Windows types → sandbox + reputation, everything else →
    /// all engines.
    fn default() -> Self {
        Self::new(DEFAULT_TABLE.clone(), Fallback::All)
    }
}
