//! Output directories and the operation mode of a run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::sheets::SheetOptions;

/// Name of the output root under the home directory and of the log file.
pub const PROJECT_NAME: &str = "gdrive2sheet";

/// What a run does with the converted rows. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationMode {
    /// Print a truncated table to the console. The labels are informational.
    Print { labels: Vec<String> },
    /// Replace the contents of a worksheet.
    Gsheet(SheetOptions),
}

impl OperationMode {
    /// Names, links and dates are shortened only for console output.
    pub fn truncate(&self) -> bool {
        matches!(self, OperationMode::Print { .. })
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Print { .. } => write!(f, "PRINT"),
            OperationMode::Gsheet(_) => write!(f, "GSHEET"),
        }
    }
}

/// Directories the tool writes to.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_out_root: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Layout rooted at `root`: `<root>/logs` holds the log files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let project_out_root = root.into();
        let log_dir = project_out_root.join("logs");
        Self {
            project_out_root,
            log_dir,
        }
    }

    /// `~/gdrive2sheet`, falling back to the current directory without a home.
    pub fn from_home() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(PROJECT_NAME))
    }

    /// Create the output root and log directory if missing.
    pub fn ensure_created(&self) -> Result<()> {
        ensure_dir_created(&self.project_out_root)?;
        ensure_dir_created(&self.log_dir)?;
        Ok(())
    }
}

fn ensure_dir_created(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}
