//! Internal representation for the dataflow lowering engine.
//!
//! The representation is generated from the frontend AST.
//! The key differences between the frontend AST and the IR are:
//! 1. The IR refers to channels through per-process [`Identity`] handles
//!    instead of names. Aliased names resolve to one identity.
//! 2. Selection statements are classified into split, merge, mixer, and
//!    arbiter elements, and unconnected targets become explicit `None`s.

// Modules defining internal structures.
mod builder;
mod context;
mod element;
mod expr;
mod printer;
mod scope;

// Re-export types at the module level.
pub use builder::ProcessBuilder;
pub use context::{Context, LowerConfig, Process};
pub use element::{Arbiter, Buffer, Element, Func, Merge, Mixer, Sink, Split};
pub use expr::Expr;
pub use printer::Printer;
pub use scope::{Channel, ChannelKind, Identity, Scope};

pub use dflowmap_utils::{GetName, Id};

// Re-export types from the frontend.
pub use dflowmap_frontend::{BinOp, ChanType, Direction, UnOp};

/// Module to transform AST programs into IR.
pub mod from_ast;
