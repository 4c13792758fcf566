//! Board use-case services.
//!
//! # Responsibility
//! - Normalize request input before it reaches repositories.
//! - Keep callers decoupled from storage details.

pub mod post_service;
pub mod user_service;
