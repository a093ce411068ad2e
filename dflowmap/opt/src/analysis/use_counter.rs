use super::{check_element, traversal};
use dflowmap_ir::{self as ir, Identity};
use dflowmap_utils::DflowResult;
use linked_hash_map::LinkedHashMap;

/// For every channel read by a process, the number of reads beyond the
/// first. Entries are kept in first-sighting order so the copy elements
/// planned from them come out in a stable order.
#[derive(Debug, Default, Clone)]
pub struct UseCounts {
    counts: LinkedHashMap<Identity, u32>,
}

impl UseCounts {
    /// Count every channel reference of `process`, rejecting malformed
    /// elements along the way.
    pub fn collect(process: &ir::Process) -> DflowResult<Self> {
        let mut uses = UseCounts::default();
        for el in &process.elements {
            check_element(el, &process.scope)?;
            for id in traversal::element_uses(el) {
                uses.record(id);
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            for (id, n) in uses.iter().filter(|(_, n)| *n > 0) {
                log::debug!(
                    "`{}' is read {} times in `{}'",
                    process.scope.name_of(id),
                    n + 1,
                    process.name
                );
            }
        }
        Ok(uses)
    }

    fn record(&mut self, id: Identity) {
        match self.counts.get_mut(&id) {
            Some(n) => *n += 1,
            None => {
                self.counts.insert(id, 0);
            }
        }
    }

    /// Reads beyond the first, or `None` if the channel is never read.
    pub fn get(&self, id: Identity) -> Option<u32> {
        self.counts.get(&id).copied()
    }

    pub fn is_read(&self, id: Identity) -> bool {
        self.counts.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identity, u32)> + '_ {
        self.counts.iter().map(|(id, n)| (*id, *n))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::{BinOp, Expr, ProcessBuilder};

    #[test]
    fn counts_references_beyond_the_first() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let x = b.input("x", 8).unwrap();
        let g = b.input("g", 1).unwrap();
        let o = b.output("o", 8).unwrap();
        let t = b.channel("t", ir::ChanType::Int(8)).unwrap();
        // a + a counts once: one functional unit, one argument port.
        b.func(Expr::binary(BinOp::Add, Expr::var(a), Expr::var(a)), t);
        b.func(Expr::binary(BinOp::Mul, Expr::var(a), Expr::var(x)), o);
        b.merge(g, [a, t], o);
        let p = b.build();
        let uses = UseCounts::collect(&p).unwrap();
        assert_eq!(uses.get(a), Some(2));
        assert_eq!(uses.get(x), Some(0));
        assert_eq!(uses.get(g), Some(0));
        assert_eq!(uses.get(t), Some(0));
        assert_eq!(uses.get(o), None);
        assert!(!uses.is_read(o));
        let order: Vec<_> = uses.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, x, g, t]);
    }

    #[test]
    fn malformed_elements_fail_the_count() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let g = b.input("g", 1).unwrap();
        let o = b.output("o", 8).unwrap();
        b.merge(g, [a], o);
        let p = b.build();
        assert!(UseCounts::collect(&p).is_err());
    }
}
