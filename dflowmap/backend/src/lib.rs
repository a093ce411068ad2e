//! Backends for the dflowmap compiler.
mod chp;
mod library;
mod traits;

pub use chp::{ChpBackend, NAMESPACE, write_cost_block, write_process};
pub use library::write_template;
pub use traits::Backend;
