use super::MetricsEntry;
use linked_hash_map::LinkedHashMap;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Area and leakage accumulated per instance over the whole run, plus a
/// histogram of the copy elements that fan-out resolution inserted.
#[derive(Debug, Default)]
pub struct Statistics {
    area: LinkedHashMap<String, i64>,
    leakage: LinkedHashMap<String, i64>,
    /// bit-width -> number of outputs -> count
    copies: BTreeMap<u32, BTreeMap<u32, usize>>,
}

impl Statistics {
    /// Record one call site of `instance`.
    pub fn record(&mut self, instance: &str, metrics: &MetricsEntry) {
        *self.area.entry(instance.to_string()).or_insert(0) += metrics.area;
        *self.leakage.entry(instance.to_string()).or_insert(0) +=
            metrics.leakage;
    }

    pub fn record_copy(&mut self, width: u32, outputs: u32) {
        *self
            .copies
            .entry(width)
            .or_default()
            .entry(outputs)
            .or_insert(0) += 1;
    }

    pub fn total_area(&self) -> i64 {
        self.area.values().sum()
    }

    pub fn total_leakage(&self) -> i64 {
        self.leakage.values().sum()
    }

    pub fn area_of(&self, instance: &str) -> Option<i64> {
        self.area.get(instance).copied()
    }

    pub fn copy_count(&self, width: u32, outputs: u32) -> usize {
        self.copies
            .get(&width)
            .and_then(|r| r.get(&outputs))
            .copied()
            .unwrap_or(0)
    }

    fn write_table(
        out: &mut String,
        title: &str,
        table: &LinkedHashMap<String, i64>,
    ) -> std::fmt::Result {
        let total: i64 = table.values().sum();
        writeln!(out, "{title}:")?;
        let mut rows: Vec<_> = table.iter().collect();
        // Largest first, ties in first-recorded order.
        rows.sort_by(|a, b| b.1.cmp(a.1));
        for (inst, val) in rows {
            let ratio = if total == 0 {
                0.0
            } else {
                *val as f64 / total as f64 * 100.0
            };
            writeln!(out, "{inst:>40} {val:>8} {ratio:>5.1}%")?;
        }
        writeln!(out, "{:>40} {total:>8}", "total")?;
        writeln!(out)
    }

    /// Text report of the statistics gathered so far.
    pub fn report(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        Self::write_table(&mut out, "Area Statistics", &self.area)?;
        Self::write_table(&mut out, "Leakage Statistics", &self.leakage)?;
        writeln!(out, "Copy Statistics:")?;
        for (width, record) in &self.copies {
            writeln!(out, "{width}-bit copy:")?;
            for (outputs, count) in record {
                writeln!(out, "  {outputs} outputs: {count}")?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_per_instance() {
        let mut stats = Statistics::default();
        stats.record("copy<8,2>", &MetricsEntry::new(1, 0, 0, 10));
        stats.record("copy<8,2>", &MetricsEntry::new(1, 0, 0, 10));
        stats.record("sink<8>", &MetricsEntry::new(3, 0, 0, 5));
        stats.record_copy(8, 2);
        stats.record_copy(8, 2);
        stats.record_copy(4, 3);
        assert_eq!(stats.area_of("copy<8,2>"), Some(20));
        assert_eq!(stats.total_area(), 25);
        assert_eq!(stats.total_leakage(), 5);
        assert_eq!(stats.copy_count(8, 2), 2);
        assert_eq!(stats.copy_count(8, 3), 0);
        let report = stats.report().unwrap();
        let copy_line = report.lines().position(|l| l.contains("copy<8,2>"));
        let sink_line = report.lines().position(|l| l.contains("sink<8>"));
        assert!(copy_line < sink_line);
        assert!(report.contains("4-bit copy:\n  3 outputs: 1\n8-bit copy:\n  2 outputs: 2\n"));
    }
}
