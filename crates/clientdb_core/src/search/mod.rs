//! Client search entry points.
//!
//! # Responsibility
//! - Own filter composition and joined-row shaping for client lookups.
//! - Keep criterion values out of SQL text.

pub mod filter;
