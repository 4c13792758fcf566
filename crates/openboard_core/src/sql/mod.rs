//! Parameterized SQL construction helpers.
//!
//! # Responsibility
//! - Expand variable-arity inserts and IN-lists into placeholder groups.
//! - Keep list and count reads on one shared predicate.
//!
//! # Invariants
//! - Caller values are always bound, never interpolated into SQL text.

pub mod builder;
