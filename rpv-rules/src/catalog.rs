//! The case catalog.
//!
//! An explicit, ordered table of rule cases. Nothing registers itself; the
//! standard table is built by [`Catalog::standard`].

use crate::case::{RuleCase, Suite};
use crate::cases;
use crate::error::RuleError;

/// One catalog row.
pub struct CatalogEntry {
    /// The case.
    pub case: Box<dyn RuleCase>,
    /// Whether `run-all` style runs include it.
    pub enabled: bool,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("case", &self.case.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Rule cases in registration order.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard cases. Cases known to disagree with the storage driver
    /// are listed but disabled.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        let table: Vec<(Box<dyn RuleCase>, bool)> = vec![
            (Box::new(cases::required_node_affinity()), true),
            (Box::new(cases::preferred_node_affinity()), true),
            (Box::new(cases::numeric_node_affinity()), true),
            (Box::new(cases::replica_topology_affinity()), true),
            (Box::new(cases::replica_topology_spread()), true),
            (Box::new(cases::unsatisfiable_node_affinity()), false),
            (Box::new(cases::volume_affinity_exists()), true),
            (Box::new(cases::volume_affinity_in()), true),
            (Box::new(cases::volume_affinity_does_not_exist()), true),
            (Box::new(cases::volume_affinity_not_in()), true),
            (Box::new(cases::volume_anti_affinity_exists()), true),
            (Box::new(cases::volume_anti_affinity_in()), true),
            (Box::new(cases::volume_anti_affinity_does_not_exist()), false),
            (Box::new(cases::volume_anti_affinity_not_in()), false),
            (Box::new(cases::volume_topology_affinity()), true),
            (Box::new(cases::volume_topology_anti_affinity()), true),
            (Box::new(cases::multiple_volume_anti_affinity()), true),
            (Box::new(cases::replica_and_volume_topology_affinity()), true),
        ];
        for (case, enabled) in table {
            // Names in the table are unique; see tests.
            if let Err(e) = catalog.insert(case, enabled) {
                tracing::error!("Skipping standard case: {}", e);
            }
        }
        catalog
    }

    /// Add an enabled case.
    pub fn register(&mut self, case: Box<dyn RuleCase>) -> Result<(), RuleError> {
        self.insert(case, true)
    }

    /// Add a case that is listed but skipped by default.
    pub fn register_disabled(&mut self, case: Box<dyn RuleCase>) -> Result<(), RuleError> {
        self.insert(case, false)
    }

    fn insert(&mut self, case: Box<dyn RuleCase>, enabled: bool) -> Result<(), RuleError> {
        if self.entries.iter().any(|e| e.case.name() == case.name()) {
            return Err(RuleError::DuplicateCase(case.name().to_string()));
        }
        tracing::debug!("Registered rule case '{}' (enabled: {})", case.name(), enabled);
        self.entries.push(CatalogEntry { case, enabled });
        Ok(())
    }

    /// Look up a case by name, enabled or not.
    pub fn get(&self, name: &str) -> Result<&CatalogEntry, RuleError> {
        self.entries
            .iter()
            .find(|e| e.case.name() == name)
            .ok_or_else(|| RuleError::UnknownCase(name.to_string()))
    }

    /// Every entry in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Enabled entries only.
    pub fn enabled(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }

    /// Entries of one suite.
    pub fn by_suite(&self, suite: Suite) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.case.suite() == suite)
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
