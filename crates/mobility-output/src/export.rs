//! Artifact export and import.
//!
//! Every write goes to a hidden temporary file next to the destination and
//! is renamed over it once complete, so a reader never observes a partial
//! artifact and a failed write leaves the previous version intact.

use crate::error::{ExportError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Frame export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Apache Parquet.
    #[default]
    Parquet,

    /// Comma-separated values. List columns are not representable.
    Csv,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }

    /// Whether the format stores list-typed columns.
    pub const fn supports_lists(&self) -> bool {
        matches!(self, Self::Parquet)
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ExportError::InvalidFormat(path.display().to_string()))?
            .parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Temporary sibling used while `path` is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Run `write` against a temporary sibling of `path`, then rename it into place.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let outcome = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    match outcome {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            debug!(path = %path.display(), "artifact committed");
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Write a frame in `format` to `path`.
pub fn write_frame(path: &Path, df: &mut DataFrame, format: ExportFormat) -> Result<()> {
    if !format.supports_lists() {
        if let Some(column) = df
            .get_columns()
            .iter()
            .find(|c| matches!(c.dtype(), DataType::List(_)))
        {
            return Err(ExportError::InvalidFormat(format!(
                "column '{}' is a list and cannot be written as {}",
                column.name(),
                format.extension()
            )));
        }
    }

    write_atomic(path, |writer| {
        match format {
            ExportFormat::Parquet => {
                ParquetWriter::new(writer).finish(df)?;
            }
            ExportFormat::Csv => {
                CsvWriter::new(writer).include_header(true).finish(df)?;
            }
        }
        Ok(())
    })?;
    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "frame written"
    );
    Ok(())
}

/// Write a value as pretty-printed JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })?;
    info!(path = %path.display(), "json written");
    Ok(())
}

/// Read a frame written by [`write_frame`]; the format follows the extension.
///
/// `text_columns` are forced to strings when reading CSV, so labels that
/// happen to look numeric survive the round trip.
pub fn read_frame(path: &Path, text_columns: &[&str]) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ExportError::MissingArtifact(path.display().to_string()));
    }
    let df = match ExportFormat::from_path(path)? {
        ExportFormat::Parquet => ParquetReader::new(File::open(path)?).finish()?,
        ExportFormat::Csv => {
            let overrides = Schema::from_iter(
                text_columns
                    .iter()
                    .map(|name| (PlSmallStr::from(*name), DataType::String)),
            );
            CsvReadOptions::default()
                .with_has_header(true)
                .with_schema_overwrite(Some(Arc::new(overrides)))
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?
        }
    };
    debug!(path = %path.display(), rows = df.height(), "frame read");
    Ok(df)
}
