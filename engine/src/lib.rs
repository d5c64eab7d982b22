//! # scl
//!
//! A provenance-aware Datalog engine for a subset of the Scallop language.
//!
//! Every tuple carries a tag from a provenance semiring. Joins multiply
//! tags, alternative derivations add them, and each result is reported
//! with a weight: always `1.0` under `unit`, a probability under the
//! probabilistic provenances.
//!
//! ## Quick Start
//!
//! ```rust
//! use scl::{Context, ProvenanceMode, SclResult, Value, ValueType};
//!
//! fn main() -> SclResult<()> {
//!     let mut ctx = Context::new(ProvenanceMode::default());
//!     ctx.add_relation("parent", &[ValueType::String, ValueType::String])?;
//!     ctx.add_facts(
//!         "parent",
//!         vec![
//!             (None, vec![Value::string("Emily"), Value::string("Bob")]),
//!             (None, vec![Value::string("Bob"), Value::string("Alice")]),
//!         ],
//!     )?;
//!     ctx.add_program("rel grandparent(a, c) = parent(a, b), parent(b, c)")?;
//!     ctx.run()?;
//!
//!     let grandparent = ctx.relation("grandparent")?;
//!     assert_eq!(grandparent.len(), 1);
//!     assert_eq!(grandparent[0].0, 1.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Program syntax
//!
//! ```text
//! type edge(a: i32, b: i32)
//! rel edge = {(0, 1), 0.5::(1, 2)}
//! rel path(a, b) = edge(a, b)
//! rel path(a, c) = path(a, b), edge(b, c)
//! rel unreachable(a, b) = node(a), node(b), not path(a, b)
//! ```

pub mod analysis;
pub mod ast;
pub mod compiler;
pub mod context;
pub mod error;
pub mod parser;
pub mod provenance;
pub mod resource_limits;
pub mod runtime;
pub mod value;

pub use ast::Span;
pub use compiler::{CompiledProgram, RelationSignature};
pub use context::{is_relation_name, Context};
pub use error::{ErrorDetails, SclError};
pub use parser::parse;
pub use provenance::{Provenance, ProvenanceMode};
pub use resource_limits::ResourceLimits;
pub use value::{format_tuple, Tuple, Value, ValueType};

/// Result type for engine operations
pub type SclResult<T> = Result<T, SclError>;

#[cfg(test)]
mod tests;
