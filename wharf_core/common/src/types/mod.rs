pub mod columns;
pub mod definitions;
pub mod policy;
pub mod value;

pub use columns::{ColumnSpec, ColumnType, ValueRule};
pub use definitions::{IntegrationDefinition, SourceFormat, TransformationDefinition};
pub use policy::ErrorPolicy;
pub use value::SqlValue;
