//! Interface for a dflowmap backend.
use dflowmap_opt::LoweredProcess;
use dflowmap_utils::DflowResult;

/// A backend receives the lowered processes of a run in order.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;
    /// Emit one process. Templates and cost blocks carried by `process` are
    /// the ones first seen in it.
    fn emit_process(&mut self, process: &LoweredProcess) -> DflowResult<()>;
    /// Flush and close every output.
    fn finish(&mut self) -> DflowResult<()>;
}
