//! `rpv list`: show the case catalog.

use anyhow::Result;
use rpv_rules::Catalog;

use super::parse_suite;

/// Print the catalog as a table. Disabled cases only with `all`.
pub fn run(suite: Option<&str>, all: bool) -> Result<bool> {
    let suite = parse_suite(suite)?;
    let catalog = Catalog::standard();

    let entries: Vec<_> = catalog
        .iter()
        .filter(|entry| all || entry.enabled)
        .filter(|entry| suite.map_or(true, |s| entry.case.suite() == s))
        .collect();

    let width = entries
        .iter()
        .map(|entry| entry.case.name().len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    println!(
        "{:<width$}  {:<23}  {:<7}  DESCRIPTION",
        "NAME",
        "SUITE",
        "ENABLED",
        width = width
    );
    for entry in &entries {
        println!(
            "{:<width$}  {:<23}  {:<7}  {}",
            entry.case.name(),
            entry.case.suite().as_str(),
            if entry.enabled { "yes" } else { "no" },
            entry.case.description(),
            width = width
        );
    }

    tracing::debug!("Listed {} of {} cases", entries.len(), catalog.len());
    Ok(true)
}
