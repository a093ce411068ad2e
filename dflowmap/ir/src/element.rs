//! Dataflow elements of a process.
use crate::{Expr, Identity};
use smallvec::SmallVec;

/// Buffer annotation on a function output: `-> [depth, init] out`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub depth: u64,
    /// Initial token. Must be a constant for the element to lower.
    pub init: Option<Expr>,
}

/// `expr -> output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    pub expr: Expr,
    /// `None` for `expr -> *`, which only lowers when `expr` is a bare
    /// channel (a sink).
    pub output: Option<Identity>,
    pub buffer: Option<Buffer>,
}

/// Routes `input` to the output selected by `guard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub guard: Identity,
    pub input: Identity,
    /// Unconnected outputs are `None`.
    pub outputs: SmallVec<[Option<Identity>; 4]>,
}

/// Forwards the input selected by `guard` to `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge {
    pub guard: Identity,
    pub inputs: SmallVec<[Identity; 4]>,
    pub output: Identity,
}

/// Forwards whichever input arrives to `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixer {
    pub inputs: SmallVec<[Identity; 4]>,
    pub output: Identity,
}

/// Like a mixer, and additionally reports the index of the winning input
/// on `ctrl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbiter {
    pub inputs: SmallVec<[Identity; 4]>,
    pub output: Identity,
    pub ctrl: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    pub input: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Func(Func),
    Split(Split),
    Merge(Merge),
    Mixer(Mixer),
    Arbiter(Arbiter),
    Sink(Sink),
    /// Functions lowered together into one functional unit.
    Cluster(Vec<Func>),
}

impl Element {
    /// Short name of the element kind used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Func(_) => "function",
            Element::Split(_) => "split",
            Element::Merge(_) => "merge",
            Element::Mixer(_) => "mixer",
            Element::Arbiter(_) => "arbiter",
            Element::Sink(_) => "sink",
            Element::Cluster(_) => "dataflow_cluster",
        }
    }

    /// Rewrite every channel reference in place.
    pub fn map_identities<F>(&mut self, mut f: F)
    where
        F: FnMut(Identity) -> Identity,
    {
        fn func<F: FnMut(Identity) -> Identity>(func: &mut Func, f: &mut F) {
            func.expr.map_identities(f);
            func.output = func.output.map(&mut *f);
            if let Some(init) =
                func.buffer.as_mut().and_then(|b| b.init.as_mut())
            {
                init.map_identities(f);
            }
        }
        match self {
            Element::Func(fu) => func(fu, &mut f),
            Element::Cluster(fus) => {
                fus.iter_mut().for_each(|fu| func(fu, &mut f))
            }
            Element::Split(s) => {
                s.guard = f(s.guard);
                s.input = f(s.input);
                s.outputs.iter_mut().for_each(|o| *o = o.map(&mut f));
            }
            Element::Merge(m) => {
                m.guard = f(m.guard);
                m.inputs.iter_mut().for_each(|i| *i = f(*i));
                m.output = f(m.output);
            }
            Element::Mixer(m) => {
                m.inputs.iter_mut().for_each(|i| *i = f(*i));
                m.output = f(m.output);
            }
            Element::Arbiter(a) => {
                a.inputs.iter_mut().for_each(|i| *i = f(*i));
                a.output = f(a.output);
                a.ctrl = f(a.ctrl);
            }
            Element::Sink(s) => s.input = f(s.input),
        }
    }
}
