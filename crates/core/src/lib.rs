//! `schoolerp-core`: shared building blocks for the SchoolERP client.
//!
//! This crate contains **pure** primitives (no IO, no transport).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{SchoolId, UserId};
