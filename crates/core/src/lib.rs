//! `stockwatch-core`: shared building blocks.
//!
//! Typed identifiers and the domain error model. No IO lives here.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::ItemId;
