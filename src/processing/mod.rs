//! Compression engines and the per-image pipeline.
//!
//! - [`engine`]: Resolves `(media type, algorithm)` to a tuned [`Operation`].
//! - [`executor`]: Runs operations as external processes.
//! - [`pipeline`]: Sequences the steps of one run and reports on them.

pub mod engine;
pub mod executor;
pub mod pipeline;

pub use engine::{Algorithm, Invocation, Operation, family_algorithms, select_operation};
pub use executor::{NativeRunner, OperationRunner};
pub use pipeline::Pipeline;
