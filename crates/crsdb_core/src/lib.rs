//! Immutable domain model for coordinate reference systems and the
//! coordinate operations between them.
//!
//! Objects are shared through `Arc` and never mutated after construction.
//! Equality is structural and includes identity.

pub mod compose;
pub mod crs;
pub mod cs;
pub mod datum;
pub mod extent;
pub mod grid;
pub mod ident;
pub mod name;
pub mod operation;
pub mod unit;

#[cfg(test)]
pub(crate) mod testutil;
