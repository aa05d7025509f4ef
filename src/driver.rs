//! Locating compilation units on disk and translating them into one
//! output file.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;

use crate::error::Error;
use crate::program::{Options, Program};

pub const SOURCE_EXTENSION: &str = "vm";
pub const OUTPUT_EXTENSION: &str = "asm";

fn is_source(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// The `.vm` files making up the program at `input`, in translation order.
///
/// A file is its own single unit; a directory contributes every `.vm` file
/// directly inside it, sorted by path.
pub fn collect_units(input: &Path) -> io::Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut units = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if is_source(&path) {
            units.push(path);
        }
    }
    units.sort();
    Ok(units)
}

/// Unit name used to qualify statics and labels: the file stem.
pub fn unit_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `Foo.vm` becomes `Foo.asm`; directory `Prog/` becomes `Prog/Prog.asm`.
pub fn output_path(input: &Path) -> PathBuf {
    if input.is_dir() {
        let name = input
            .canonicalize()
            .ok()
            .and_then(|dir| dir.file_name().map(|n| n.to_os_string()))
            .unwrap_or_else(|| "out".into());
        let mut path = input.join(name);
        path.set_extension(OUTPUT_EXTENSION);
        path
    } else {
        input.with_extension(OUTPUT_EXTENSION)
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("no .vm files found in {}", .0.display())]
    NoUnits(PathBuf),

    #[error("output {} would overwrite an input file", .0.display())]
    OutputIsInput(PathBuf),

    #[error("failed to translate {}: {source}", .path.display())]
    Unit { path: PathBuf, source: Error },

    #[error("{failed} of {total} units failed to translate; partial output in {}", .output.display())]
    Incomplete {
        failed: usize,
        total: usize,
        output: PathBuf,
    },

    #[error(transparent)]
    Program(#[from] Error),
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// One translation run: every unit under `input` into a single `.asm` file.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    /// Defaults to [`output_path`] of the input.
    pub output: Option<PathBuf>,
    /// `None` bootstraps directories but not single files. Overrides
    /// `options.bootstrap`.
    pub bootstrap: Option<bool>,
    /// Skip failing units instead of aborting. The run still fails.
    pub keep_going: bool,
    pub options: Options,
}

impl Job {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Job {
            input: input.into(),
            output: None,
            bootstrap: None,
            keep_going: false,
            options: Options::default(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| output_path(&self.input))
    }

    /// The translation options with the bootstrap default applied.
    pub fn resolved_options(&self) -> Options {
        Options {
            bootstrap: self.bootstrap.unwrap_or_else(|| self.input.is_dir()),
            ..self.options.clone()
        }
    }

    /// Translates every unit and writes the output file, returning its path.
    ///
    /// Without `keep_going` the first failing unit aborts the run and nothing
    /// is written. With it, the remaining units are written and the run
    /// reports [`DriverError::Incomplete`].
    pub fn run(&self) -> Result<PathBuf, DriverError> {
        let units = collect_units(&self.input).map_err(|source| DriverError::Read {
            path: self.input.clone(),
            source,
        })?;
        if units.is_empty() {
            return Err(DriverError::NoUnits(self.input.clone()));
        }

        let output = self.output_path();
        if units.iter().any(|unit| same_file(unit, &output)) {
            return Err(DriverError::OutputIsInput(output));
        }

        let mut program = Program::new(self.resolved_options())?;
        let mut failed = 0;
        for path in &units {
            let source = fs::read_to_string(path).map_err(|source| DriverError::Read {
                path: path.clone(),
                source,
            })?;
            if let Err(source) = program.add_unit(&unit_name(path), &source) {
                if !self.keep_going {
                    return Err(DriverError::Unit {
                        path: path.clone(),
                        source,
                    });
                }
                error!("{}", source);
                warn!("Skipping {}", path.display());
                failed += 1;
            }
        }

        let write_error = |source| DriverError::Write {
            path: output.clone(),
            source,
        };
        let file = File::create(&output).map_err(write_error)?;
        program.write_to(BufWriter::new(file)).map_err(write_error)?;
        info!("Wrote {} lines to {}", program.lines().len(), output.display());

        if failed > 0 {
            return Err(DriverError::Incomplete {
                failed,
                total: units.len(),
                output,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_file() {
        let input = Path::new("progs/Simple.vm");
        assert_eq!(collect_units(input).unwrap(), vec![input.to_path_buf()]);
        assert_eq!(unit_name(input), "Simple");
        assert_eq!(output_path(input), PathBuf::from("progs/Simple.asm"));
    }

    #[test]
    fn test_directory() {
        let dir = tempfile::tempdir().unwrap();
        let prog = dir.path().join("FibonacciElement");
        fs::create_dir(&prog).unwrap();
        fs::write(prog.join("Sys.vm"), "function Sys.init 0\n").unwrap();
        fs::write(prog.join("Main.vm"), "function Main.fibonacci 0\n").unwrap();
        fs::write(prog.join("notes.txt"), "not a unit\n").unwrap();
        fs::create_dir(prog.join("nested.vm")).unwrap();

        let units = collect_units(&prog).unwrap();
        let names: Vec<String> = units.iter().map(|p| unit_name(p)).collect();
        assert_eq!(names, vec!["Main", "Sys"]);
        assert_eq!(
            output_path(&prog),
            prog.join("FibonacciElement.asm")
        );
    }

    fn program_dir(units: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let prog = dir.path().join("Prog");
        fs::create_dir(&prog).unwrap();
        for (name, source) in units {
            fs::write(prog.join(name), source).unwrap();
        }
        (dir, prog)
    }

    const GOOD: &str = "function Good.run 0\npush constant 1\npop static 0\nreturn\n";
    const BAD: &str = "function Bad.run 0\npop constant 1\nreturn\n";

    #[test]
    fn test_failing_unit_aborts_without_output() {
        let (_dir, prog) = program_dir(&[("Bad.vm", BAD), ("Good.vm", GOOD)]);
        let job = Job::new(&prog);

        let err = job.run().unwrap_err();
        assert!(matches!(&err, DriverError::Unit { path, .. } if path.ends_with("Bad.vm")));
        assert!(!job.output_path().exists());
    }

    #[test]
    fn test_keep_going_writes_remaining_units() {
        let (_dir, prog) = program_dir(&[("Bad.vm", BAD), ("Good.vm", GOOD)]);
        let job = Job {
            keep_going: true,
            ..Job::new(&prog)
        };

        let err = job.run().unwrap_err();
        match err {
            DriverError::Incomplete { failed, total, output } => {
                assert_eq!((failed, total), (1, 2));
                let text = fs::read_to_string(output).unwrap();
                assert!(text.contains("(Good.run)"));
                assert!(!text.contains("Bad.run"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bootstrap_defaults_by_input_kind() {
        let (_dir, prog) = program_dir(&[("Sys.vm", "function Sys.init 0\nlabel HALT\ngoto HALT\n")]);
        let output = Job::new(&prog).run().unwrap();
        assert_eq!(output, prog.join("Prog.asm"));
        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().next(), Some("// bootstrap"));

        let file = prog.join("Sys.vm");
        let output = Job::new(&file).run().unwrap();
        assert_eq!(output, prog.join("Sys.asm"));
        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().next(), Some("// function Sys.init 0"));

        let forced = Job {
            bootstrap: Some(true),
            ..Job::new(&file)
        };
        assert!(forced.resolved_options().bootstrap);
        let suppressed = Job {
            bootstrap: Some(false),
            ..Job::new(&prog)
        };
        assert!(!suppressed.resolved_options().bootstrap);
    }

    #[test]
    fn test_output_never_overwrites_input() {
        let (_dir, prog) = program_dir(&[("Main.asm", "push constant 1\n"), ("Good.vm", GOOD)]);

        let asm = prog.join("Main.asm");
        let err = Job::new(&asm).run().unwrap_err();
        assert!(matches!(err, DriverError::OutputIsInput(ref path) if *path == asm));
        assert_eq!(fs::read_to_string(&asm).unwrap(), "push constant 1\n");

        let source = prog.join("Good.vm");
        let job = Job {
            output: Some(prog.join(".").join("Good.vm")),
            ..Job::new(&prog)
        };
        assert!(matches!(job.run(), Err(DriverError::OutputIsInput(_))));
        assert_eq!(fs::read_to_string(&source).unwrap(), GOOD);
    }

    #[test]
    fn test_invalid_file_name_is_reported() {
        let (_dir, prog) = program_dir(&[("my-prog.vm", GOOD)]);
        let err = Job::new(&prog).run().unwrap_err();
        match err {
            DriverError::Unit { source, .. } => assert_eq!(source.unit(), Some("my-prog")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
