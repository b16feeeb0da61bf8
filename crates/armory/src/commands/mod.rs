//! CLI command implementations

pub mod catalog;
pub mod completions;
pub mod preflight;
pub mod provision;
pub mod report;
pub mod version;
