use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: invalid path: {source}", .path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: unsupported entry type ({kind})", .path.display())]
    UnsupportedEntryType {
        path: PathBuf,
        kind: EntryKind,
        root: bool,
    },
    #[error("{}: failed to open file: {source}", .path.display())]
    FileOpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: failed to read file: {source}", .path.display())]
    FileReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: failed to open directory: {source}", .path.display())]
    DirectoryOpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: failed to read metadata: {source}", .path.display())]
    MetadataFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    /// Whether the error aborts the whole invocation rather than one entry.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::InvalidPath { .. } | Error::ThreadPool(_) | Error::Output(_) => true,
            Error::UnsupportedEntryType { root, .. } => *root,
            _ => false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::InvalidPath { path, .. }
            | Error::UnsupportedEntryType { path, .. }
            | Error::FileOpenFailure { path, .. }
            | Error::FileReadFailure { path, .. }
            | Error::DirectoryOpenFailure { path, .. }
            | Error::MetadataFailure { path, .. } => Some(path),
            Error::ThreadPool(_) | Error::Output(_) => None,
        }
    }
}

/// What a path turned out to be when it was neither a file nor a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Symlink,
    Other,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Symlink => write!(f, "symbolic link"),
            EntryKind::Other => write!(f, "not a regular file or directory"),
        }
    }
}

impl From<std::fs::FileType> for EntryKind {
    fn from(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}
