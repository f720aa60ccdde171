// Declare the modules to re-export
pub mod config;
pub mod ingestors;
pub mod logger;
pub mod model;
pub mod server;
pub mod state;
pub mod supervisor;

// Re-export the types most callers need
pub use config::Config;
pub use model::{RunnerRecord, RunnerSnapshot, RunnerUpdate, UpdateSource};
pub use state::{MergeOutcome, TrackerState};
pub use supervisor::Supervisor;
