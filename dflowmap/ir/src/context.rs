//! An IR context. This is the top-level object for an IR and contains all
//! information needed to lower and emit a program.
use crate::{Element, Identity, Scope};
use dflowmap_utils::{GetName, Id};

/// Configuration handed to the lowering engine.
#[derive(Debug, Clone, Default)]
pub struct LowerConfig {
    /// Use the pipelined variants of the structural templates.
    pub pipeline: bool,
}

/// One dataflow process.
#[derive(Debug, Clone)]
pub struct Process {
    pub name: Id,
    /// Signature channels in declaration order.
    pub ports: Vec<Identity>,
    pub scope: Scope,
    /// Elements in declaration order. Channel references are canonical.
    pub elements: Vec<Element>,
}

impl GetName for Process {
    fn name(&self) -> Id {
        self.name
    }
}

/// The IR Context that represents an entire program.
#[derive(Debug, Default)]
pub struct Context {
    /// Processes in definition order.
    pub processes: Vec<Process>,
    pub config: LowerConfig,
}
