//! Business logic services for Delicious.
//!
//! # Services
//!
//! - `auth` - Registration, password login, account edits, password reset
//! - `email` - Transactional email (password reset)
//! - `uploads` - Store photo uploads

pub mod auth;
pub mod email;
pub mod uploads;
