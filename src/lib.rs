pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
#[cfg(feature = "server")]
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::QaConfig;

pub use adapters::{HttpReferenceSource, ShapefileSource, SqliteStore};
pub use core::{MunicatGenerator, QaEngine, ReportLog};
pub use domain::model::{LineType, QaResponse, ReportEntry};
pub use utils::error::{QaError, Result};
