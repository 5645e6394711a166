//! Node binary support: configuration, command line, runtime wiring, the
//! step loop and ledger audit export.

pub mod audit;
pub mod cli;
pub mod config;
pub mod runtime;
pub mod setup;

pub use audit::AuditReport;
pub use config::Config;
pub use runtime::builder::{build_runtime, SentinelRuntime};
pub use runtime::simulation::{run_simulation, SimulationSummary};
