//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no Axum).
//! Trait definitions, domain error types, closed vocabularies and the
//! progression arithmetic.

pub mod errors;
pub mod progression;
pub mod repositories;
pub mod vocabulary;

pub use errors::DomainError;
pub use repositories::*;
pub use vocabulary::*;
