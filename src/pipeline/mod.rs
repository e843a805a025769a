//! # Pipeline Module
//!
//! La pipeline di stripping, separata in sottomoduli:
//! - `batch_stripper`: Orchestratore principale della run
//! - `task_stripper`: Worker per singoli file
//! - `progress_tracker`: Reporter unificato (progress bar o JSON)
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod batch_stripper;
pub mod task_stripper;
pub mod progress_tracker;
pub mod path_resolver;

pub use batch_stripper::{BatchStripper, RunState};
pub use task_stripper::TaskStripper;
pub use progress_tracker::ProgressTracker;
pub use path_resolver::PathResolver;
