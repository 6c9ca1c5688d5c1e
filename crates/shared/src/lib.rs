//! InnerOS Shared Types and Utilities
//!
//! This crate contains the domain types and database utilities shared across
//! the InnerOS membership platform.

pub mod db;
pub mod types;

pub use types::*;
