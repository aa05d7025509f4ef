//! Translating a whole program: bootstrap followed by each unit in turn.

use std::collections::HashSet;
use std::io::{self, Write};

use log::{debug, info};

use crate::bootstrap::{bootstrap, BOOTSTRAP_UNIT, DEFAULT_ENTRY, DEFAULT_STACK_BASE};
use crate::error::{Error, UnitNameError};
use crate::parser::{Reader, SYMBOL_CHARS};
use crate::translator::{LabelCounter, Translator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Emit the SP setup and entry call before any unit.
    pub bootstrap: bool,
    /// Function called by the bootstrap.
    pub entry: String,
    /// Initial stack pointer.
    pub stack_base: u16,
    /// Keep the `// <command>` annotations in the output.
    pub comments: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            bootstrap: false,
            entry: DEFAULT_ENTRY.to_string(),
            stack_base: DEFAULT_STACK_BASE,
            comments: true,
        }
    }
}

/// A linear instruction stream built up one unit at a time.
///
/// A unit either translates completely or contributes nothing; units added
/// before a failure keep their output. A failed unit's name may be reused.
pub struct Program {
    options: Options,
    translator: Translator,
    units: HashSet<String>,
    output: Vec<String>,
}

impl Program {
    pub fn new(options: Options) -> Result<Self, Error> {
        Program::with_counter(options, LabelCounter::default())
    }

    pub fn with_counter(options: Options, counter: LabelCounter) -> Result<Self, Error> {
        debug!("{:?}", options);

        let mut program = Program {
            options,
            translator: Translator::with_counter("", counter),
            units: HashSet::new(),
            output: Vec::new(),
        };
        if program.options.bootstrap {
            let code = bootstrap(program.options.stack_base, &program.options.entry)
                .map_err(Error::Bootstrap)?;
            program.append(code);
        }
        Ok(program)
    }

    fn append(&mut self, code: Vec<String>) -> usize {
        let before = self.output.len();
        let comments = self.options.comments;
        self.output
            .extend(code.into_iter().filter(|line| comments || !line.starts_with("//")));
        self.output.len() - before
    }

    fn check_unit_name(&self, name: &str) -> Result<(), UnitNameError> {
        let first = name.chars().next().ok_or(UnitNameError::Empty)?;
        if first.is_ascii_digit() {
            return Err(UnitNameError::LeadingDigit);
        }
        if let Some(c) = name.chars().find(|&c| c == ':' || !SYMBOL_CHARS.contains(c)) {
            return Err(UnitNameError::InvalidChar(c));
        }
        if name == BOOTSTRAP_UNIT {
            return Err(UnitNameError::Reserved);
        }
        if self.units.contains(name) {
            return Err(UnitNameError::Duplicate);
        }
        Ok(())
    }

    /// Translates one unit and appends it, returning the number of lines added.
    pub fn add_unit(&mut self, name: &str, source: &str) -> Result<usize, Error> {
        self.check_unit_name(name).map_err(|source| Error::UnitName {
            unit: name.to_string(),
            source,
        })?;
        self.translator.set_unit(name);

        let mut code = Vec::new();
        let mut commands = 0;
        for parsed in Reader::new(source) {
            let parsed = parsed.map_err(|source| Error::Parse {
                unit: name.to_string(),
                source,
            })?;
            let translated = self
                .translator
                .translate_command(&parsed.command)
                .map_err(|source| Error::Codegen {
                    unit: name.to_string(),
                    line: parsed.line,
                    command: parsed.command.to_string(),
                    source,
                })?;
            code.extend(translated);
            commands += 1;
        }

        self.units.insert(name.to_string());
        let added = self.append(code);
        info!("{}: {} commands, {} lines", self.translator.unit(), commands, added);
        Ok(added)
    }

    pub fn lines(&self) -> &[String] {
        &self.output
    }

    pub fn into_lines(self) -> Vec<String> {
        self.output
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for instruction in &self.output {
            writeln!(writer, "{}", instruction)?;
        }
        writer.flush()
    }
}
