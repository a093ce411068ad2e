//! Analysis for dataflow processes.
//!
//! The analyses are rebuilt from scratch for every process and answer the
//! questions lowering asks about it: how wide is a channel, how often is it
//! read, and which copy output serves the next read.

mod bitwidth;
mod copy_plan;
pub mod traversal;
mod use_counter;
mod well_formed;

pub use bitwidth::BitwidthIndex;
pub use copy_plan::{CopyElement, CopyPlan};
pub use use_counter::UseCounts;
pub use well_formed::check_element;
