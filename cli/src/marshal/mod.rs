//! Marshaling between request JSON and the engine context.
//!
//! Type resolution and fact conversion happen before any engine call;
//! registration, program loading and projection go through `scl::Context`.

pub mod facts;
pub mod loader;
pub mod projector;
pub mod registrar;
pub mod types;

pub use facts::{marshal, RawFact, RelationSchema};
pub use loader::{LoaderKind, ProgramLoader};
pub use projector::{project, EvaluatedTuple, Projection};
pub use registrar::register;
pub use types::{resolve, TypeTag};
