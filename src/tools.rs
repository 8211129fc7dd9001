pub mod file;
pub mod query;
pub mod registry;
pub mod schema;
pub mod table;
pub mod tabular;

use anyhow::Result;

pub use registry::ToolRegistry;

/// The file and CSV tools offered to the model, in a stable order.
pub fn builtin_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    file::register(&mut registry)?;
    tabular::register(&mut registry)?;
    Ok(registry)
}
