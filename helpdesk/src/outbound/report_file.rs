//! Saves rendered ticket reports through `cap_std`.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use tracing::info;

use crate::domain::TicketReport;

/// Write `report` into `directory` under its own file name, replacing any
/// existing file, and return the full path.
///
/// # Errors
///
/// Returns the underlying I/O error when the directory cannot be opened or
/// the file cannot be written.
pub fn write_report(directory: &Path, report: &TicketReport) -> io::Result<PathBuf> {
    let dir = Dir::open_ambient_dir(directory, ambient_authority())?;
    dir.write(Path::new(&report.file_name), &report.bytes)?;
    let path = directory.join(&report.file_name);
    info!(path = %path.display(), rows = report.row_count, "ticket report saved");
    Ok(path)
}
