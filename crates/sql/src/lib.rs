//! SQL safety layer for econsql.
//!
//! - **Registry**: the tables and columns a generated query may reference (`registry`).
//! - **Validation**: grammar-based checks that turn an untrusted SQL string into an
//!   [`AcceptedQuery`] or a [`Rejection`] (`validator`).
//! - **Row caps**: rewriting of the outermost `LIMIT` (`row_limit`).
pub mod error;
pub mod parser;
pub mod registry;
pub mod row_limit;
pub mod sanitize;
pub mod validator;

pub use error::{RegistryError, Rejection};
pub use registry::{ColumnSchema, ScalarType, SchemaContext, SchemaRegistry, TableSchema};
pub use validator::{AcceptedQuery, QueryValidator, ValidationVerdict};
