//! Exporters that write report artifacts into a report directory.

pub mod components;

use std::path::{Path, PathBuf};

use crate::error::ExportError;

pub use components::{
    read_components, Component, ComponentType, ComponentsDocument, ComponentsPublisher,
    ExportedComponent, ResourceRole, COMPONENTS_FILE,
};

/// Writes one artifact into `report_dir`, next to the output of other
/// publishers, and returns the path it wrote.
pub trait ReportPublisher: Send + Sync {
    fn export(&self, report_dir: &Path) -> Result<PathBuf, ExportError>;
}
