use dflowmap_ir::{self as ir, Identity};
use dflowmap_utils::{DflowResult, Error};
use std::collections::HashMap;

/// Bit-width of every canonical channel of one process.
///
/// Built once before a process is lowered. Asking for an identity that has
/// no entry means the graph handed to lowering is inconsistent.
pub struct BitwidthIndex<'a> {
    scope: &'a ir::Scope,
    widths: HashMap<Identity, u32>,
}

impl<'a> BitwidthIndex<'a> {
    pub fn build(scope: &'a ir::Scope) -> Self {
        let widths: HashMap<_, _> = scope
            .channels()
            .filter(|(id, _)| scope.is_canonical(*id))
            .map(|(id, ch)| (id, ch.width))
            .collect();
        log::debug!("bitwidth index with {} entries", widths.len());
        BitwidthIndex { scope, widths }
    }

    pub fn width(&self, id: Identity) -> DflowResult<u32> {
        self.widths.get(&id).copied().ok_or_else(|| {
            Error::inconsistent_graph(format!(
                "no bitwidth recorded for `{}'",
                self.scope.name_of(id)
            ))
        })
    }

    pub fn scope(&self) -> &'a ir::Scope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }
}
