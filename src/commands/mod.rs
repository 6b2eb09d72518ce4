//! CLI command implementations.

pub mod check;
pub mod history;
pub mod probe;
pub mod watch;

pub use check::CheckCommand;
pub use history::HistoryCommand;
pub use probe::ProbeCommand;
pub use watch::WatchCommand;
