use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::builder::RangedU64ValueParser;
use clap::{ArgAction, Parser};

use crate::walk::{Options, DEFAULT_READ_SIZE};

#[derive(Debug, Parser)]
#[command(
    name = "md5gen",
    version,
    about = "Generate md5 digests for a single file or all files in a folder",
    disable_version_flag = true
)]
pub struct Cli {
    /// Display version information
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Path of the file or folder to hash (`-path` is also accepted)
    #[arg(short = 'p', long = "path", value_name = "PATH", conflicts_with = "target")]
    pub path: Option<PathBuf>,

    /// Same as --path
    #[arg(value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Number of files to hash at once, 0 for one per CPU
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    pub jobs: usize,

    /// Bytes read from a file per call
    #[arg(
        long = "read-size",
        value_name = "BYTES",
        default_value_t = DEFAULT_READ_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub read_size: usize,
}

impl Cli {
    /// The path to hash, whether it came from `-p` or a bare argument.
    pub fn root(&self) -> Option<&Path> {
        self.path.as_deref().or(self.target.as_deref())
    }

    pub fn options(&self) -> Options {
        Options {
            jobs: self.jobs,
            read_size: self.read_size,
        }
    }
}

/// Rewrite the single dash `-path` spelling to `--path` so clap accepts it.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if arg == "-path" {
                OsString::from("--path")
            } else {
                arg
            }
        })
        .collect()
}
