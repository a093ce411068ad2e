//! Frontend parsing and AST representation for the dataflow process
//! language.
//!
//! A file holds one or more `defproc` blocks. Each block declares typed
//! channels and a `dataflow { ... }` body made of functions, splits,
//! merges, mixers, arbiters, sinks, and function clusters.
pub mod ast;
pub mod parser;

pub use ast::{
    Alias, BinOp, BufferSpec, ChanType, ChannelDecl, Direction, DflowStmt,
    Expr, FuncStmt, NamespaceDef, PortDef, ProcessDef, Target, UnOp,
};
pub use parser::DflowParser;
