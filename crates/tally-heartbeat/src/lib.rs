pub mod controller;
pub mod daemon;
pub mod process;
pub mod stats;

pub use controller::{DaemonController, DaemonState, StartOutcome, StopOutcome};
pub use daemon::{install_termination_flag, refresh_best_effort, HeartbeatLoop, TickOutcome};
pub use process::{ProcessTable, SystemProcesses};
