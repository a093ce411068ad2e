//! Shared utilities for the dflowmap compiler.
mod errors;
mod id;
mod math;
mod namegenerator;
mod out_file;

pub use errors::{DflowResult, Error, ErrorKind};
pub use id::{GetName, Id};
pub use math::{bits_for_value, fits_in_width};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
