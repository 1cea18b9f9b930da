pub mod toml_config;

pub use toml_config::QaConfig;

#[cfg(feature = "cli")]
use crate::domain::model::LineType;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "delimit-qa")]
#[command(about = "Quality check of a boundary line before loading it into the database")]
pub struct CliConfig {
    /// Identifier of the line folder in the upload directory
    #[arg(long)]
    pub line_id: u32,

    #[arg(long, value_enum, default_value = "mtt")]
    pub line_type: LineType,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "delimit-qa.toml")]
    pub config: String,

    /// Print the report as JSON instead of plain lines
    #[arg(long)]
    pub json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}
