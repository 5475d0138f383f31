//! Domain primitives for the access key rotation reminder.
//!
//! This crate owns the audit rules, owner resolution and message rendering.
//! It intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod account;
pub mod audit;
pub mod config;
pub mod contract;
pub mod grouping;
pub mod message;
