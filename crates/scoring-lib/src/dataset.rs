//! Tabular input and output
//!
//! Input datasets and result tables are polars `DataFrame`s read from and
//! written to comma-separated files with a header row.

use crate::error::{Result, ScoringError};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Rows sampled for schema inference
const INFER_SCHEMA_ROWS: usize = 100;

/// A read-only input table and the path it came from
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    frame: DataFrame,
}

impl Dataset {
    pub fn new(path: impl Into<PathBuf>, frame: DataFrame) -> Self {
        Self {
            path: path.into(),
            frame,
        }
    }

    /// Read a CSV file with a header row
    pub fn read_csv(path: &Path) -> Result<Self> {
        let frame = read_frame(path).map_err(|reason| ScoringError::DatasetUnreadable {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(Self::new(path, frame))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Column names in table order
    pub fn columns(&self) -> Vec<String> {
        column_names(&self.frame)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }
}

fn read_frame(path: &Path) -> std::result::Result<DataFrame, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| e.to_string())
}

/// Column names of a frame in order
pub fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Write `frame` to `path` as CSV, replacing any existing file atomically
///
/// Each call writes to its own uniquely named temp file in the destination
/// directory, so concurrent writers never share a partial file. The temp
/// file is removed if any step fails.
pub fn write_csv(frame: &DataFrame, path: &Path) -> Result<()> {
    let persist_err = |source: std::io::Error| ScoringError::PersistenceError {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(persist_err)?;

    let mut temp = NamedTempFile::new_in(parent).map_err(persist_err)?;
    let mut frame = frame.clone();
    CsvWriter::new(temp.as_file_mut())
        .include_header(true)
        .finish(&mut frame)
        .map_err(|e| persist_err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    temp.as_file().sync_all().map_err(persist_err)?;

    temp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

/// Reload a persisted result table
pub fn read_result_table(path: &Path) -> Result<DataFrame> {
    read_frame(path).map_err(|reason| ScoringError::DatasetUnreadable {
        path: path.to_path_buf(),
        reason,
    })
}
