//! Streaming monthly aggregation.
//!
//! [`MonthlyAggregate`] is a keyed accumulator: district labels are interned
//! once into a [`DistrictId`], and each id owns a month-ordered map of cohort
//! sums in an arena. Chunks are reduced to partial aggregates and folded in
//! with [`MonthlyAggregate::merge`], which is associative and commutative, so
//! the result does not depend on chunk size, chunk order or file split.
//!
//! Sums are exact integers; memory grows with distinct `(district, month)`
//! keys, not with raw rows.

use crate::error::{DataError, Result};
use crate::reader::{ReadStats, RecordChunks, discover_csv_files};
use crate::record::{DistrictKey, Month, RawRecord, StreamKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dense index of an interned district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DistrictId(u32);

impl DistrictId {
    /// Position in the arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interns district keys into dense ids.
#[derive(Debug, Clone, Default)]
pub struct DistrictInterner {
    keys: Vec<DistrictKey>,
    index: HashMap<DistrictKey, DistrictId>,
}

impl DistrictInterner {
    /// Id for `key`, allocating one on first sight.
    pub fn intern(&mut self, key: &DistrictKey) -> DistrictId {
        if let Some(&id) = self.index.get(key) {
            return id;
        }
        let id = DistrictId(self.keys.len() as u32);
        self.keys.push(key.clone());
        self.index.insert(key.clone(), id);
        id
    }

    /// Id for `key` if it was interned.
    pub fn get(&self, key: &DistrictKey) -> Option<DistrictId> {
        self.index.get(key).copied()
    }

    /// Key behind an id.
    pub fn resolve(&self, id: DistrictId) -> &DistrictKey {
        &self.keys[id.index()]
    }

    /// Number of interned districts.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Running cohort sums for one `(district, month)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortSums(Vec<i64>);

impl CohortSums {
    /// All-zero sums for `width` cohorts.
    pub fn zeros(width: usize) -> Self {
        Self(vec![0; width])
    }

    /// Add one record's counters; missing values contribute zero.
    pub fn add_record(&mut self, values: &[Option<i64>]) {
        for (sum, value) in self.0.iter_mut().zip(values) {
            *sum += value.unwrap_or(0);
        }
    }

    /// Element-wise add another set of sums.
    pub fn add(&mut self, other: &Self) {
        for (sum, value) in self.0.iter_mut().zip(&other.0) {
            *sum += value;
        }
    }

    /// Sum for the cohort at `idx`.
    pub fn get(&self, idx: usize) -> Option<i64> {
        self.0.get(idx).copied()
    }

    /// Sums in cohort order.
    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

/// Per-`(district, month)` cohort sums for one stream.
#[derive(Debug, Clone)]
pub struct MonthlyAggregate {
    stream: StreamKind,
    interner: DistrictInterner,
    arena: Vec<BTreeMap<Month, CohortSums>>,
}

impl MonthlyAggregate {
    /// Empty aggregate; the identity of [`Self::merge`].
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            interner: DistrictInterner::default(),
            arena: Vec::new(),
        }
    }

    /// Aggregate a slice of records in one pass.
    pub fn from_records(stream: StreamKind, records: &[RawRecord]) -> Self {
        let mut aggregate = Self::new(stream);
        for record in records {
            aggregate.absorb(record);
        }
        aggregate
    }

    /// Stream these sums belong to.
    pub const fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Add one record. Records without a parsed month are skipped.
    pub fn absorb(&mut self, record: &RawRecord) {
        let Some(month) = record.month() else {
            return;
        };
        let width = self.stream.cohorts().len();
        let id = self.slot(&record.district);
        self.arena[id.index()]
            .entry(month)
            .or_insert_with(|| CohortSums::zeros(width))
            .add_record(&record.cohorts);
    }

    /// Reduce a chunk to partial sums, then merge them in.
    pub fn absorb_chunk(&mut self, chunk: &[RawRecord]) {
        let partial = Self::from_records(self.stream, chunk);
        self.add_sums(partial);
    }

    /// Element-wise add another aggregate of the same stream.
    ///
    /// Keys missing on either side are treated as zero. Aggregates of
    /// different streams are rejected and `self` is left unchanged.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        if self.stream != other.stream {
            return Err(DataError::StreamMismatch {
                expected: self.stream.name().to_string(),
                actual: other.stream.name().to_string(),
            });
        }
        self.add_sums(other);
        Ok(())
    }

    fn add_sums(&mut self, other: Self) {
        let width = self.stream.cohorts().len();
        let Self {
            interner, arena, ..
        } = other;
        for (idx, months) in arena.into_iter().enumerate() {
            let key = interner.resolve(DistrictId(idx as u32));
            let id = self.slot(key);
            let target = &mut self.arena[id.index()];
            for (month, sums) in months {
                target
                    .entry(month)
                    .or_insert_with(|| CohortSums::zeros(width))
                    .add(&sums);
            }
        }
    }

    fn slot(&mut self, key: &DistrictKey) -> DistrictId {
        let id = self.interner.intern(key);
        if id.index() == self.arena.len() {
            self.arena.push(BTreeMap::new());
        }
        id
    }

    /// Sums for one key.
    pub fn get(&self, key: &DistrictKey, month: Month) -> Option<&CohortSums> {
        let id = self.interner.get(key)?;
        self.arena[id.index()].get(&month)
    }

    /// Number of `(district, month)` keys.
    pub fn len(&self) -> usize {
        self.arena.iter().map(BTreeMap::len).sum()
    }

    /// Whether no key has been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct districts.
    pub fn district_count(&self) -> usize {
        self.interner.len()
    }

    /// Every key with its sums, in interning order then month order.
    pub fn iter(&self) -> impl Iterator<Item = (&DistrictKey, Month, &CohortSums)> + '_ {
        self.arena.iter().enumerate().flat_map(move |(idx, months)| {
            let key = self.interner.resolve(DistrictId(idx as u32));
            months.iter().map(move |(month, sums)| (key, *month, sums))
        })
    }

    /// Canonical ordered view, independent of interning order.
    pub fn entries(&self) -> BTreeMap<(DistrictKey, Month), CohortSums> {
        self.iter()
            .map(|(key, month, sums)| ((key.clone(), month), sums.clone()))
            .collect()
    }
}

impl PartialEq for MonthlyAggregate {
    fn eq(&self, other: &Self) -> bool {
        self.stream == other.stream && self.entries() == other.entries()
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Maximum records held in memory per chunk (default: 300,000)
    pub chunk_size: usize,
    /// Aggregate the files of a directory in parallel (default: true)
    pub parallel: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300_000,
            parallel: true,
        }
    }
}

/// Aggregates raw CSV chunks into [`MonthlyAggregate`]s.
#[derive(Debug, Default)]
pub struct StreamingAggregator {
    config: AggregationConfig,
}

impl StreamingAggregator {
    /// Create an aggregator.
    pub const fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate one CSV source chunk by chunk.
    pub fn aggregate_chunks<R: std::io::Read>(
        &self,
        mut chunks: RecordChunks<R>,
        stream: StreamKind,
    ) -> Result<(MonthlyAggregate, ReadStats)> {
        let mut aggregate = MonthlyAggregate::new(stream);
        for chunk in chunks.by_ref() {
            let chunk = chunk?;
            debug!(stream = %stream, rows = chunk.len(), "absorbing chunk");
            aggregate.absorb_chunk(&chunk);
        }
        Ok((aggregate, chunks.stats()))
    }

    /// Aggregate one CSV file.
    pub fn aggregate_file(
        &self,
        stream: StreamKind,
        path: &Path,
    ) -> Result<(MonthlyAggregate, ReadStats)> {
        let chunks = RecordChunks::open(path, stream, self.config.chunk_size)?;
        let result = self.aggregate_chunks(chunks, stream)?;
        debug!(file = %path.display(), keys = result.0.len(), "aggregated file");
        Ok(result)
    }

    /// Aggregate every CSV file of `dir`.
    pub fn aggregate_directory(&self, stream: StreamKind, dir: &Path) -> Result<MonthlyAggregate> {
        let files = discover_csv_files(dir)?;
        self.aggregate_files(stream, &files, |_| {})
    }

    /// Aggregate the given files, calling `on_file` after each one finishes.
    pub fn aggregate_files<F>(
        &self,
        stream: StreamKind,
        files: &[PathBuf],
        on_file: F,
    ) -> Result<MonthlyAggregate>
    where
        F: Fn(&Path) + Sync,
    {
        Ok(self.aggregate_files_with_stats(stream, files, on_file)?.0)
    }

    /// Like [`Self::aggregate_files`], also returning the combined read statistics.
    ///
    /// Files are reduced independently and combined through
    /// [`MonthlyAggregate::merge`], in parallel when configured.
    pub fn aggregate_files_with_stats<F>(
        &self,
        stream: StreamKind,
        files: &[PathBuf],
        on_file: F,
    ) -> Result<(MonthlyAggregate, ReadStats)>
    where
        F: Fn(&Path) + Sync,
    {
        if files.is_empty() {
            return Err(DataError::NoInputFiles {
                path: PathBuf::new(),
            });
        }

        info!(stream = %stream, files = files.len(), "aggregating stream");

        let run = |path: &PathBuf| {
            let result = self.aggregate_file(stream, path);
            on_file(path);
            result
        };
        let combine = |mut acc: (MonthlyAggregate, ReadStats), (aggregate, stats)| {
            acc.0.merge(aggregate)?;
            acc.1.combine(stats);
            Ok::<_, DataError>(acc)
        };
        let identity = || (MonthlyAggregate::new(stream), ReadStats::default());

        let (aggregate, stats) = if self.config.parallel {
            files
                .par_iter()
                .map(run)
                .try_reduce(identity, |a, b| combine(a, b))?
        } else {
            files
                .iter()
                .map(run)
                .try_fold(identity(), |acc, item| combine(acc, item?))?
        };

        if stats.invalid_dates > 0 || stats.invalid_counts > 0 {
            warn!(
                stream = %stream,
                invalid_dates = stats.invalid_dates,
                invalid_counts = stats.invalid_counts,
                "coerced unparseable values to missing"
            );
        }
        info!(
            stream = %stream,
            rows = stats.rows,
            districts = aggregate.district_count(),
            keys = aggregate.len(),
            "stream aggregated"
        );

        Ok((aggregate, stats))
    }
}
