//! Physical cost of the emitted instances.
//!
//! Structural elements must have an entry in one of the loaded metrics
//! files. Functional units are looked up first and synthesized through a
//! [CostEstimator] on a miss; synthesized entries are appended to the
//! custom metrics file so later runs find them.
mod estimator;
mod statistics;
pub mod store;

pub use estimator::{
    Assignment, CommandEstimator, CostEstimator, EstimateRequest, ExprNode,
    RawCost, Signal, normalize,
};
pub use statistics::Statistics;
pub use store::MetricsEntry;

use crate::lower::{ExprGraph, FUDescriptor};
use crate::naming::normalize_key;
use dflowmap_utils::{DflowResult, Error};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Input latch of a synthesized unit, per bit.
pub const LATCH: &str = "latch1";
/// Two-input handshake join in front of a synthesized unit.
pub const TWO_TO_ONE: &str = "twoToOne";

/// Keyed cost lookup shared by every process of the run.
#[derive(Default)]
pub struct MetricsCache {
    entries: HashMap<String, MetricsEntry>,
    custom: Option<PathBuf>,
    estimator: Option<Box<dyn CostEstimator>>,
}

impl MetricsCache {
    pub fn with_estimator(mut self, estimator: Box<dyn CostEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Load a standard metrics file. Returns the number of records read.
    pub fn load_file(&mut self, path: &Path) -> DflowResult<usize> {
        let start = Instant::now();
        let records = store::load(path)?;
        let n = records.len();
        for (key, entry) in records {
            self.insert(&key, entry);
        }
        log::info!(
            "Loaded {n} metrics from {} in {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(n)
    }

    /// Use `path` to persist synthesized metrics. Records already in the
    /// file are loaded.
    pub fn set_custom_file(&mut self, path: PathBuf) -> DflowResult<()> {
        if path.exists() {
            self.load_file(&path)?;
        }
        self.custom = Some(path);
        Ok(())
    }

    pub fn insert(&mut self, key: &str, entry: MetricsEntry) {
        let key = normalize_key(key);
        if let Some(prev) = self.entries.insert(key.clone(), entry) {
            if prev != entry {
                log::warn!("metrics for `{key}' ({prev}) overridden by ({entry})");
            }
        }
    }

    pub fn lookup(&self, key: &str) -> Option<MetricsEntry> {
        self.entries.get(&normalize_key(key)).copied()
    }

    /// Cost of a primitive structural element. Absence is fatal.
    pub fn require_structural(&self, key: &str) -> DflowResult<MetricsEntry> {
        self.lookup(key)
            .ok_or_else(|| Error::missing_metrics(normalize_key(key)))
    }

    /// Cost of a functional unit, synthesized on a miss.
    ///
    /// Returns `None` if the unit only forwards its argument, or if no
    /// estimator is configured.
    pub fn get_or_synthesize(
        &mut self,
        fu: &FUDescriptor,
        graph: &ExprGraph,
    ) -> DflowResult<Option<MetricsEntry>> {
        let key = fu.instance_key();
        if let Some(entry) = self.lookup(&key) {
            return Ok(Some(entry));
        }
        if fu.is_forward() {
            return Ok(None);
        }
        if self.estimator.is_none() {
            log::warn!("no metrics for `{key}' and no estimator configured");
            return Ok(None);
        }
        let latch = self.require_structural(LATCH)?;
        let two_to_one = self.require_structural(TWO_TO_ONE)?;
        let request = graph.request(fu);
        let raw = match self.estimator.as_mut() {
            Some(est) => est.estimate(&request)?,
            None => return Ok(None),
        };
        let entry = normalize(&raw, &request, &latch, &two_to_one);
        log::debug!("synthesized `{key}': {entry}");
        self.insert(&key, entry);
        if let Some(path) = &self.custom {
            store::append(path, &normalize_key(&key), &entry)?;
        }
        Ok(Some(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_utils::ErrorKind;

    #[test]
    fn lookups_are_normalized() {
        let mut cache = MetricsCache::default();
        cache.insert("copy_8_2_", MetricsEntry::new(1, 2, 3, 4));
        assert_eq!(cache.lookup("copy<8,2>"), Some(MetricsEntry::new(1, 2, 3, 4)));
        assert_eq!(cache.lookup("copy<8, 2>"), None);
        assert!(cache.require_structural("copy<8,2>").is_ok());
        let err = cache.require_structural("sink<4>").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingMetrics(k) if k == "sink_4_"));
        assert!(err.to_string().contains("cost database incomplete"));
    }

    #[test]
    fn malformed_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.metrics");
        std::fs::write(&path, "copy_8_2_ 1 2 3 4\nsink_8_ 1 2 3 4 5\n").unwrap();
        let mut cache = MetricsCache::default();
        let err = cache.load_file(&path).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MetricsFile { line: 2, .. }));
    }

    #[test]
    fn later_files_override() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.metrics");
        let b = dir.path().join("b.metrics");
        std::fs::write(&a, "sink_8_ 1 1 1 1\n").unwrap();
        std::fs::write(&b, "sink_8_ 2 2 2 2\n").unwrap();
        let mut cache = MetricsCache::default();
        assert_eq!(cache.load_file(&a).unwrap(), 1);
        assert_eq!(cache.load_file(&b).unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("sink<8>"), Some(MetricsEntry::new(2, 2, 2, 2)));
    }
}
