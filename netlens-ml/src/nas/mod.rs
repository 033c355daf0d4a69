//! Architecture search over small dense classifiers.
//!
//! Each candidate gets a fresh oracle from an [`OracleFactory`](netlens_core::OracleFactory),
//! is trained for a fixed number of epochs and scored on held-out data.

pub mod candidate;
pub mod engine;
pub mod genetic;

pub use candidate::ArchitectureCandidate;
pub use engine::{ArchitectureResult, ArchitectureSearch, NasRun, next_generation, select_parents};
pub use genetic::{crossover, mutate};
