//! Domain model for clients and their phone numbers.
//!
//! # Responsibility
//! - Define canonical data structures used by repository and callers.
//!
//! # Invariants
//! - A phone never exists without its owning client.
//! - Deletion is a hard delete; phones follow their client by cascade.

pub mod client;
