//! Translator from the stack VM intermediate language to Hack assembly.
//!
//! The pipeline per unit is [`parser::Reader`] producing [`ast::Command`]s,
//! each expanded immediately by [`translator::Translator`]. [`Program`] ties
//! units together behind an optional [`bootstrap`](bootstrap::bootstrap).

pub mod ast;
pub mod bootstrap;
pub mod driver;
pub mod error;
pub mod parser;
pub mod program;
pub mod translator;

pub use driver::{DriverError, Job};
pub use error::{Error, ErrorKind, UnitNameError};
pub use program::{Options, Program};
pub use translator::{CodegenError, LabelCounter, Translator};

/// Translates a single unit with default options and no bootstrap.
pub fn translate_source(unit: &str, source: &str) -> Result<Vec<String>, Error> {
    let mut program = Program::new(Options::default())?;
    program.add_unit(unit, source)?;
    Ok(program.into_lines())
}
