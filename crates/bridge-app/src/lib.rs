//! Command-line front end for the shared-memory bridge table.

pub mod config;
pub mod fatal;
pub mod logging;
pub mod report;
