//! # armory-core
//!
//! Core library for the Armory CLI providing:
//! - Catalog file parsing (armory.yaml)
//! - Type definitions for tool specs, outcomes, and runtime policies
//! - Filesystem layout for acquisition trees, logs, and published commands
//! - Retry execution engine with policy-based configuration

pub mod catalog;
pub mod error;
pub mod layout;
pub mod retry;
pub mod types;
pub mod utils;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use layout::Layout;
pub use utils::get_home_dir;
