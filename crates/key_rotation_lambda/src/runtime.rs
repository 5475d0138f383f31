//! Re-exports of the domain crate so handlers and binaries share one path.

pub use key_rotation_core::{account, audit, config, contract, grouping, message};
