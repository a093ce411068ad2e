use super::{BitwidthIndex, UseCounts};
use crate::naming::normalize_channel;
use dflowmap_ir::Identity;
use dflowmap_utils::{DflowResult, Error};
use std::collections::HashMap;

/// A synthesized fan-out node: one input channel replicated to `outputs`
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyElement {
    pub input: Identity,
    /// Declared name of the input channel.
    pub source: String,
    pub width: u32,
    pub outputs: u32,
}

impl CopyElement {
    pub fn instance_key(&self) -> String {
        format!("copy<{},{}>", self.width, self.outputs)
    }

    pub fn instance_name(&self) -> String {
        format!("{}copy", normalize_channel(&self.source))
    }

    /// Reference to the `idx`-th output port.
    pub fn port(&self, idx: u32) -> String {
        format!("{}.out[{idx}]", self.instance_name())
    }
}

#[derive(Debug)]
struct Cursor {
    /// Index into [CopyPlan::copies], if the channel is read more than once.
    copy: Option<usize>,
    next: u32,
}

/// Copy elements for one process and the per-channel cursor that hands out
/// their output ports.
///
/// Ports are handed out in the order [next_source](CopyPlan::next_source)
/// is called. Lowering calls it in the order given by
/// [element_uses](super::traversal::element_uses), the same order the use
/// counter walked, so the n-th read of a channel receives port n.
#[derive(Debug)]
pub struct CopyPlan {
    copies: Vec<CopyElement>,
    cursors: HashMap<Identity, Cursor>,
    names: HashMap<Identity, String>,
}

impl CopyPlan {
    pub fn plan(uses: &UseCounts, widths: &BitwidthIndex) -> DflowResult<Self> {
        let sc = widths.scope();
        let mut copies = Vec::new();
        let mut cursors = HashMap::with_capacity(uses.len());
        let mut names = HashMap::with_capacity(uses.len());
        for (id, n) in uses.iter() {
            let width = widths.width(id)?;
            let source = sc.name_of(id).to_string();
            let copy = if n > 0 {
                let el = CopyElement {
                    input: id,
                    source: source.clone(),
                    width,
                    outputs: n + 1,
                };
                log::debug!("{} {}({source})", el.instance_key(), el.instance_name());
                copies.push(el);
                Some(copies.len() - 1)
            } else {
                None
            };
            cursors.insert(id, Cursor { copy, next: 0 });
            names.insert(id, source);
        }
        Ok(CopyPlan {
            copies,
            cursors,
            names,
        })
    }

    /// The wire that serves the next read of `id`: the channel itself if it
    /// is read once, otherwise the next unused output of its copy element.
    pub fn next_source(&mut self, id: Identity) -> DflowResult<String> {
        let Some(cursor) = self.cursors.get_mut(&id) else {
            return Err(Error::inconsistent_graph(format!(
                "channel read during lowering was never counted: {id:?}"
            )));
        };
        let name = &self.names[&id];
        match cursor.copy {
            None => {
                if cursor.next > 0 {
                    return Err(Error::pass_divergence(name.as_str(), 1));
                }
                cursor.next += 1;
                Ok(name.clone())
            }
            Some(idx) => {
                let copy = &self.copies[idx];
                if cursor.next >= copy.outputs {
                    return Err(Error::pass_divergence(
                        name.as_str(),
                        copy.outputs,
                    ));
                }
                let port = copy.port(cursor.next);
                log::trace!("`{name}' read #{} served by {port}", cursor.next);
                cursor.next += 1;
                Ok(port)
            }
        }
    }

    pub fn copies(&self) -> &[CopyElement] {
        &self.copies
    }
}
