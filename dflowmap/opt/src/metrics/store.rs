//! Line-oriented metrics files.
//!
//! Every record is `<key> <leakage nW> <energy fJ> <delay ps> <area um2>`.
//! Blank lines and lines starting with `#` are ignored.
use dflowmap_utils::{DflowResult, Error};
use std::fmt::{self, Display};
use std::io::Write;
use std::path::Path;

/// Physical cost of one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MetricsEntry {
    /// Leakage power in nW.
    pub leakage: i64,
    /// Dynamic energy per token in fJ.
    pub energy: i64,
    /// Forward latency in ps.
    pub delay: i64,
    /// Area in um^2.
    pub area: i64,
}

impl MetricsEntry {
    pub fn new(leakage: i64, energy: i64, delay: i64, area: i64) -> Self {
        MetricsEntry {
            leakage,
            energy,
            delay,
            area,
        }
    }
}

impl Display for MetricsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.leakage, self.energy, self.delay, self.area
        )
    }
}

/// A number in a metrics record. Fractional values are truncated.
fn parse_field(field: &str) -> Option<i64> {
    field
        .parse::<i64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}

/// Parse the contents of a metrics file. `path` is only used in
/// diagnostics.
pub fn parse(path: &Path, text: &str) -> DflowResult<Vec<(String, MetricsEntry)>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [key, rest @ ..] = fields.as_slice() else {
            continue;
        };
        if rest.len() != 4 {
            return Err(Error::metrics_file(
                path,
                idx + 1,
                format!(
                    "`{key}' has {} metrics, expected 4",
                    rest.len()
                ),
            ));
        }
        let mut nums = [0i64; 4];
        for (slot, field) in nums.iter_mut().zip(rest) {
            *slot = parse_field(field).ok_or_else(|| {
                Error::metrics_file(
                    path,
                    idx + 1,
                    format!("`{field}' is not a number"),
                )
            })?;
        }
        let [leakage, energy, delay, area] = nums;
        records.push((
            key.to_string(),
            MetricsEntry::new(leakage, energy, delay, area),
        ));
    }
    Ok(records)
}

/// Read and parse a metrics file.
pub fn load(path: &Path) -> DflowResult<Vec<(String, MetricsEntry)>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::invalid_file(format!("{}: {e}", path.display()))
    })?;
    parse(path, &text)
}

/// Append one record, creating the file if needed.
pub fn append(path: &Path, key: &str, entry: &MetricsEntry) -> DflowResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::write_error(format!("{}: {e}", path.display())))?;
    writeln!(file, "{key} {entry}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_utils::ErrorKind;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("std.metrics")
    }

    #[test]
    fn records_comments_and_blanks() {
        let text = "# standard cells\n\ncopy_8_2_ 10 20 30 40\n  latch1 1 2 3 4.9  \n";
        let recs = parse(&origin(), text).unwrap();
        assert_eq!(
            recs,
            vec![
                ("copy_8_2_".to_string(), MetricsEntry::new(10, 20, 30, 40)),
                ("latch1".to_string(), MetricsEntry::new(1, 2, 3, 4)),
            ]
        );
    }

    #[test]
    fn wrong_field_count_names_the_line() {
        let text = "copy_8_2_ 10 20 30 40\nsink_8_ 1 2 3\n";
        let err = parse(&origin(), text).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MetricsFile { line: 2, .. }));
        assert_eq!(
            err.to_string(),
            "std.metrics:2: `sink_8_' has 3 metrics, expected 4"
        );
    }

    #[test]
    fn non_numeric_field() {
        let err = parse(&origin(), "sink_8_ 1 2 x 4").unwrap_err();
        assert_eq!(err.to_string(), "std.metrics:1: `x' is not a number");
    }

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.metrics");
        append(&path, "func_0add1_8_8_8_8_8_", &MetricsEntry::new(1, 2, 3, 4))
            .unwrap();
        append(&path, "func_0sub1_8_8_8_8_8_", &MetricsEntry::new(5, 6, 7, 8))
            .unwrap();
        let recs = load(&path).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].1, MetricsEntry::new(5, 6, 7, 8));
    }
}
