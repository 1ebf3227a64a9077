//! Compiles chained filter criteria into a search engine boolean query tree.
//!
//! ```
//! use criteria_compiler::{CriteriaChain, CriteriaQueryCompiler, Field};
//!
//! let chain = CriteriaChain::where_field("name")
//!     .is("foo")
//!     .or(Field::nested("addr.city", true))
//!     .contains("York");
//! let query = CriteriaQueryCompiler::new().compile(&chain).unwrap();
//! assert_eq!(query.as_bool().unwrap().should.len(), 2);
//! ```

pub mod compiler;
pub mod config;
pub mod criteria;
pub mod document;
pub mod query;

pub use compiler::CriteriaQueryCompiler;
pub use config::{ConfigError, FieldMappingConfig};
pub use criteria::{Criteria, CriteriaChain, CriteriaEntry, Field, Literal, OperationKey};
pub use document::{CriteriaDocument, DocumentError};
pub use query::Query;
