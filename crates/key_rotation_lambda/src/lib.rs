//! AWS-oriented adapters and handlers for the access key rotation reminder.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! directory and mail adapter seams) and exposes a single runtime module
//! boundary for the domain primitives in `key_rotation_core`.

pub mod adapters;
pub mod handlers;
pub mod runtime;
