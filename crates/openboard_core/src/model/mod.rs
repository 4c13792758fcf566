//! Board domain model.
//!
//! # Responsibility
//! - Define the entities returned to service callers.
//! - Keep response shapes free of storage-only fields (passwords, join rows).
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Users are soft-deleted via `deleted_at`; posts are removed outright.

pub mod page;
pub mod post;
pub mod role;
pub mod user;
