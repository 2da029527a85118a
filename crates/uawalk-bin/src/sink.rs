// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CSV result sink.
//!
//! The whole file is rendered in memory and written with a single call, so a
//! serialization failure never leaves a partial file behind. The target
//! directory must already exist.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use uawalk_opcua::PathRecord;

/// CSV header row.
pub const CSV_HEADER: [&str; 2] = ["PATH", "NAME"];

// =============================================================================
// SinkError
// =============================================================================

/// Errors writing the result file.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output directory does not exist or is not a directory.
    #[error("Output directory '{}' does not exist", path.display())]
    MissingDirectory {
        /// Directory path.
        path: PathBuf,
    },

    /// Writing the file failed.
    #[error("Failed to write '{}': {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Rendering the CSV failed.
    #[error("Failed to render CSV for '{}': {source}", path.display())]
    Csv {
        /// File path.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl SinkError {
    /// Creates a missing directory error.
    pub fn missing_directory(path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory { path: path.into() }
    }

    /// Returns the path involved in the failure.
    pub fn path(&self) -> &Path {
        match self {
            Self::MissingDirectory { path } | Self::Io { path, .. } | Self::Csv { path, .. } => {
                path
            }
        }
    }
}

// =============================================================================
// CsvSink
// =============================================================================

/// Writes path records to `directory/file_name` as `PATH,NAME` CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSink {
    directory: PathBuf,
    file_name: String,
}

impl CsvSink {
    /// Creates a sink for `directory/file_name`.
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    /// Returns the output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the full output path.
    pub fn target_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Writes `records`, sorted by path, and returns the file path.
    pub fn write(&self, records: &[PathRecord]) -> Result<PathBuf, SinkError> {
        let path = self.target_path();
        let parent = path.parent().unwrap_or(self.directory.as_path());

        if !parent.is_dir() {
            return Err(SinkError::missing_directory(parent));
        }

        let mut sorted: Vec<&PathRecord> = records.iter().collect();
        sorted.sort();

        let bytes = render(&sorted).map_err(|source| SinkError::Csv {
            path: path.clone(),
            source,
        })?;

        fs::write(&path, &bytes).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(
            path = %path.display(),
            rows = records.len(),
            bytes = bytes.len(),
            "CSV written"
        );
        Ok(path)
    }
}

/// Renders header and rows into a buffer.
fn render(records: &[&PathRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([record.path.as_str(), record.name.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

// =============================================================================
// Tests
// =============================================================================
