mod config;
mod error;
mod global_tracker;
mod logging;

pub use config::{resolve_workspace_path, RuntimeConfig};
pub use error::{Error, Result};
pub use global_tracker::{init, init_in_memory, install, is_initialized, teardown, with_tracker};
pub use logging::{install_default_logging, LoggingOptions};
