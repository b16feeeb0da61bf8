//! Retry execution engine with policy-based configuration
//!
//! Every install, clone, and download step in the engine goes through this
//! single retry primitive instead of carrying its own ad hoc loop. Two
//! backoff profiles cover the fleet: linear for install/build steps
//! (`RetryPolicy::install`) and multiplicative for network acquisition
//! (`RetryPolicy::download`).
//!
//! # Example
//!
//! ```rust,no_run
//! use armory_core::retry::{retry_with_policy, RetryError};
//! use armory_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let policy = RetryPolicy::download();
//!
//!     retry_with_policy(&policy, || async {
//!         // Fallible operation here
//!         Ok("cloned".to_string())
//!     }).await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{retry_with_policy, RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{
    calculate_delay, AlwaysRetry, ClosurePredicate, MessagePredicate, RetryPredicate,
};
