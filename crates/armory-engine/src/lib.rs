//! # armory-engine
//!
//! The provisioning engine behind the Armory CLI. The driver in
//! [`provision`] walks the catalog sequentially; for each tool it acquires a
//! source tree, classifies it into an ordered list of installation
//! strategies, executes the top strategy under timeout and retry protection
//! (resolving package conflicts first when the strategy touches the system
//! package manager), publishes a runnable wrapper when the strategy produced
//! an unpackaged artifact, and records exactly one outcome per tool in the
//! ledger. A remediation pass then retries partially-provisioned tools
//! against their still-present trees before the report is rendered.

pub mod acquire;
pub mod batch;
pub mod conflict;
pub mod exec;
pub mod hints;
pub mod ledger;
pub mod provision;
pub mod source;
pub mod strategy;
pub mod wrapper;

pub use exec::{CommandSpec, ExecutionResult, ExecutionStatus, TimeoutExecutor};
pub use ledger::{Outcome, OutcomeLedger, OutcomeStatus};
pub use provision::{ProvisionOptions, Provisioner, RunSummary};
