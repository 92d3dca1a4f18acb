//! Catalog data model: published mod versions and their dependencies.

mod definition;
mod definitions;
mod dependency;

pub use definition::{Asset, ModDefinition, ModDefinitionRecord};
pub(crate) use definition::lenient_date;
pub use definitions::ModDefinitions;
pub use dependency::{ModDependencies, ModDependency};
