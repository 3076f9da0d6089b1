//! TOML report configuration for rowsource.
//!
//! A report file names the entities it reads, one or more sources with their
//! columns and filters, driver tuning, and the merge order used when several
//! sources feed one report.

mod error;
pub mod file;
mod report;


use rowsource_core::materialize::RenderRegistry;
use std::{fs, path::Path};

// re-exports
pub use error::ConfigError;
pub use file::ReportFile;
pub use report::{MergePlan, Report, ReportSource};

/// Parse a report file without binding it.
pub fn parse_str(source: &str) -> Result<ReportFile, ConfigError> {
    Ok(toml::from_str(source)?)
}

/// Parse and bind a report from TOML text.
pub fn from_str(source: &str, registry: &RenderRegistry) -> Result<Report, ConfigError> {
    Report::build(parse_str(source)?, registry)
}

/// Read, parse, and bind a report file.
pub fn load(path: impl AsRef<Path>, registry: &RenderRegistry) -> Result<Report, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    from_str(&source, registry)
}
