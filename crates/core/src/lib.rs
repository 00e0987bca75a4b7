pub mod config;
pub mod errors;
pub mod sanitize;
pub mod schema;

pub use config::{AppConfig, ConfigError, LoadOptions, ValidationScope};
pub use errors::{ApplicationError, InterfaceError};
pub use sanitize::{classify, is_select, sanitize_sql, OutputClass};
pub use schema::{ColumnHint, SchemaContext, FACILITY_COLUMNS, IDENTITY_COLUMNS};
