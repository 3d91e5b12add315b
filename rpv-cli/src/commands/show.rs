//! `rpv show`: print a case's placement strategy document.

use anyhow::Result;
use rpv_rules::Catalog;

/// Print the storage class mapping and strategy document of `case`.
pub fn run(case: &str) -> Result<bool> {
    let catalog = Catalog::standard();
    let entry = catalog.get(case)?;
    let case = entry.case.as_ref();

    println!("# {}: {}", case.name(), case.description());
    println!("# suite: {}", case.suite());
    if !entry.enabled {
        println!("# disabled");
    }
    for (class, strategy) in case.storage_class_strategies() {
        match strategy {
            Some(strategy) => println!("# storage class {} -> {}", class, strategy),
            None => println!("# storage class {} -> (none)", class),
        }
    }
    println!("{}", case.strategy_document().trim_end());
    Ok(true)
}
