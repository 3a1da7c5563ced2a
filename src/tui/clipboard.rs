//! CSV export for dataframes
//!
//! Copies to the system clipboard via `arboard`; where there is no clipboard
//! (headless Linux, SSH) the CSV is written to a file instead.

use std::path::{Path, PathBuf};

use arboard::Clipboard;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Clipboard,
    File(PathBuf),
}

pub fn copy_to_clipboard(text: &str) -> Result<(), ExportError> {
    let mut clipboard = Clipboard::new().map_err(|e| ExportError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text)
        .map_err(|e| ExportError::Clipboard(e.to_string()))
}

/// Write `csv` to `<dir>/<component_id>.csv`
pub fn write_csv_file(dir: &Path, component_id: &str, csv: &str) -> Result<PathBuf, ExportError> {
    let name: String = component_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!("{}.csv", name));
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::write(&path, csv))
        .map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Clipboard first, file fallback
pub fn export_csv(csv: &str, dir: &Path, component_id: &str) -> Result<ExportTarget, ExportError> {
    match copy_to_clipboard(csv) {
        Ok(()) => Ok(ExportTarget::Clipboard),
        Err(e) => {
            tracing::debug!("{}; writing CSV to disk", e);
            write_csv_file(dir, component_id, csv).map(ExportTarget::File)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_export_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv_file(dir.path(), "sales/q1 report", "a,b\r\n1,2\r\n").unwrap();
        assert_eq!(path.file_name().unwrap(), "sales_q1_report.csv");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\r\n1,2\r\n");
    }

    #[test]
    fn test_file_export_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "").unwrap();

        let err = write_csv_file(&blocker, "df", "x").unwrap_err();
        assert!(err.to_string().contains("df.csv"));
    }
}
