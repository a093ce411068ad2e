//! # dflowmap
//!
//! Plumbs together the dflowmap crates and provides the command line
//! interface. Depend on [`dflowmap_opt`] and [`dflowmap_backend`] directly
//! to embed the lowering engine.
pub mod cmdline;
pub mod driver;
