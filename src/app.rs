use std::ffi::OsString;
use std::io::{self, Write};
use std::path::Path;

use clap::{CommandFactory, Parser};
use log::debug;

use crate::cli::{normalize_args, Cli};
use crate::walk::{self, FileReport, Options};
use crate::Error;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub hashed: usize,
    pub failed: usize,
}

/// Hash everything at `root`, writing digest lines to `out` and one line per
/// failed entry to `err`.
pub fn run<W: Write, E: Write>(
    root: &Path,
    options: &Options,
    out: &mut W,
    err: &mut E,
) -> Result<Summary, Error> {
    let mut summary = Summary::default();
    let mut written = Ok(());

    walk::hash_tree(root, options, |report| {
        if written.is_ok() {
            written = write_report(&report, &mut *out, &mut *err, &mut summary);
        }
    })?;
    written.map_err(Error::Output)?;

    debug!(
        "{} hashed, {} failed under {}",
        summary.hashed,
        summary.failed,
        root.display()
    );
    Ok(summary)
}

fn write_report<W: Write, E: Write>(
    report: &FileReport,
    out: &mut W,
    err: &mut E,
    summary: &mut Summary,
) -> io::Result<()> {
    match &report.outcome {
        Ok(digest) => {
            summary.hashed += 1;
            writeln!(out, "MD5 digest of file {}: {}", report.path.display(), digest)
        }
        Err(e) => {
            summary.failed += 1;
            debug!("skipping {}", report.path.display());
            writeln!(err, "Error: {e}")
        }
    }
}

/// Parse `args` and carry out the command, returning the process exit code.
pub fn execute<I, T, W, E>(args: I, out: &mut W, err: &mut E) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(normalize_args(args)) {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                EXIT_FAILURE
            } else {
                EXIT_SUCCESS
            };
            let stream: &mut dyn Write = if e.use_stderr() { err } else { out };
            let _ = write!(stream, "{}", e.render());
            return code;
        }
    };

    let Some(root) = cli.root() else {
        let _ = writeln!(err, "Error: No path provided.");
        let _ = write!(out, "{}", Cli::command().render_help());
        return EXIT_FAILURE;
    };

    match run(root, &cli.options(), out, err) {
        Ok(_) => EXIT_SUCCESS,
        Err(e) => {
            let _ = writeln!(err, "Error: {e}");
            EXIT_FAILURE
        }
    }
}
