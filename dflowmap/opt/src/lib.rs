//! # Dataflow lowering
//!
//! Lowers the processes of an [ir::Context](dflowmap_ir::Context) into
//! circuit instances: functional units synthesized from expressions, copy
//! elements for channels read more than once, and instances of the
//! structural templates for splits, merges, mixers, arbiters, sinks,
//! sources and buffers. Every instance is costed through the
//! [metrics::MetricsCache].
//!
//! ```rust
//! use dflowmap_frontend::DflowParser;
//! use dflowmap_ir as ir;
//! use dflowmap_opt::{LowerContext, lower_process, metrics::{MetricsCache, MetricsEntry}};
//! # fn main() -> dflowmap_utils::DflowResult<()> {
//! let ns = DflowParser::parse_str(
//!     "defproc add(chan?(int<8>) a, b; chan!(int<8>) o) { dataflow { a + b -> o; } }",
//! )?;
//! let ctx = ir::from_ast::ast_to_ir(ns, ir::LowerConfig::default())?;
//! let mut metrics = MetricsCache::default();
//! metrics.insert("func_0add1_8<8,8,8,8>", MetricsEntry::new(1, 2, 3, 4));
//! let mut lctx = LowerContext::new(ctx.config.clone(), metrics);
//! let lowered = lower_process(&ctx.processes[0], &mut lctx)?;
//! assert_eq!(lowered.instances[0].key, "func_0add1_8<8,8,8,8>");
//! # Ok(())
//! # }
//! ```
pub mod analysis;
pub mod cache;
pub mod lower;
pub mod metrics;
pub mod naming;

pub use lower::{LowerContext, LoweredProcess, lower_process};
