//! Delicious Core - Shared domain types.
//!
//! This crate provides the types shared by every Delicious component:
//! - `web` - The server-rendered store directory
//! - `cli` - Command-line tools for migrations, users, and seed data
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, slugs, geo points, and ratings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
