use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vmil_translator::bootstrap::{DEFAULT_ENTRY, DEFAULT_STACK_BASE};
use vmil_translator::{Job, Options};

#[derive(Parser, Debug)]
#[command(name = "vmil", version, about = "Translates VM code into Hack assembly")]
struct Args {
    /// A .vm file or a directory of .vm files
    input: PathBuf,

    /// Output assembly file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit bootstrap code (default for directories)
    #[arg(long, conflicts_with = "no_bootstrap")]
    bootstrap: bool,

    /// Never emit bootstrap code
    #[arg(long)]
    no_bootstrap: bool,

    /// Function called by the bootstrap
    #[arg(long, default_value = DEFAULT_ENTRY)]
    entry: String,

    /// Initial stack pointer
    #[arg(long, default_value_t = DEFAULT_STACK_BASE)]
    stack_base: u16,

    /// Leave out the per-command comments
    #[arg(long)]
    no_comments: bool,

    /// Report failing units and carry on with the rest
    #[arg(long)]
    keep_going: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let bootstrap = match (args.bootstrap, args.no_bootstrap) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let job = Job {
        input: args.input,
        output: args.output,
        bootstrap,
        keep_going: args.keep_going,
        options: Options {
            bootstrap: false,
            entry: args.entry,
            stack_base: args.stack_base,
            comments: !args.no_comments,
        },
    };

    job.run()?;
    Ok(())
}
