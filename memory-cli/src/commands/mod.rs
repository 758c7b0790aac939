//! Command implementations, one module per top-level CLI verb.

pub mod archival;
pub mod health;
