//! CSV discovery and chunked record reading.

use crate::error::{DataError, Result};
use crate::normalize::Normalizer;
use crate::record::{RawRecord, StreamKind};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// List the `*.csv` files of a directory in name order.
///
/// An empty result is a configuration error, not an empty dataset.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if path.is_file() && is_csv {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        return Err(DataError::NoInputFiles {
            path: dir.to_path_buf(),
        });
    }

    files.sort();
    Ok(files)
}

/// Data-quality counters gathered while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    /// Rows read
    pub rows: u64,
    /// Rows whose date did not parse (excluded from aggregation)
    pub invalid_dates: u64,
    /// Cohort values that were not numeric (counted as zero)
    pub invalid_counts: u64,
}

impl ReadStats {
    /// Add another set of counters.
    pub const fn combine(&mut self, other: Self) {
        self.rows += other.rows;
        self.invalid_dates += other.invalid_dates;
        self.invalid_counts += other.invalid_counts;
    }
}

/// Iterator over bounded-size chunks of normalized records.
#[derive(Debug)]
pub struct RecordChunks<R: Read> {
    reader: csv::Reader<R>,
    normalizer: Normalizer,
    chunk_size: usize,
    row: StringRecord,
    stats: ReadStats,
    done: bool,
}

impl RecordChunks<File> {
    /// Open a CSV file for chunked reading.
    pub fn open(path: &Path, stream: StreamKind, chunk_size: usize) -> Result<Self> {
        Self::from_reader(File::open(path)?, stream, chunk_size, path)
    }
}

impl<R: Read> RecordChunks<R> {
    /// Wrap any reader producing CSV with a header row.
    ///
    /// `source` labels errors about the header.
    pub fn from_reader(reader: R, stream: StreamKind, chunk_size: usize, source: &Path) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DataError::InvalidChunkSize(chunk_size));
        }

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let normalizer = Normalizer::from_headers(stream, &headers, source)?;

        Ok(Self {
            reader,
            normalizer,
            chunk_size,
            row: StringRecord::new(),
            stats: ReadStats::default(),
            done: false,
        })
    }

    /// Counters for everything read so far.
    pub const fn stats(&self) -> ReadStats {
        self.stats
    }

    fn next_chunk(&mut self) -> Result<Vec<RawRecord>> {
        let mut chunk = Vec::with_capacity(self.chunk_size.min(65_536));
        while chunk.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.row)? {
                self.done = true;
                break;
            }
            let record = self.normalizer.normalize(&self.row);
            self.stats.rows += 1;
            if record.date.is_none() {
                self.stats.invalid_dates += 1;
            }
            self.stats.invalid_counts +=
                record.cohorts.iter().filter(|value| value.is_none()).count() as u64;
            chunk.push(record);
        }
        Ok(chunk)
    }
}

impl<R: Read> Iterator for RecordChunks<R> {
    type Item = Result<Vec<RawRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
