use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{Digest, EntryKind, Error, Md5};

/// Read size used when none is configured.
pub const DEFAULT_READ_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Worker threads for hashing files; 0 means one per CPU.
    pub jobs: usize,
    pub read_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            jobs: 1,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    File,
    Directory,
}

/// The result of hashing one entry found under the root.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Result<Digest, Error>,
}

/// Stream `reader` through an MD5 hasher, `read_size` bytes at a time.
pub fn hash_reader<R: Read>(mut reader: R, read_size: usize) -> io::Result<Digest> {
    let mut md5 = Md5::new();
    let mut buffer = vec![0u8; read_size.max(1)];

    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        md5.update(&buffer[..count]);
    }

    Ok(md5.finalize())
}

pub fn hash_file(path: &Path, read_size: usize) -> Result<Digest, Error> {
    debug!("hashing {}", path.display());
    let file = File::open(path).map_err(|source| Error::FileOpenFailure {
        path: path.to_path_buf(),
        source,
    })?;
    hash_reader(file, read_size).map_err(|source| Error::FileReadFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Work out what the top level path is. Symlinks are followed here, so a
/// link to a file or directory is treated as its target.
pub fn classify(path: &Path) -> Result<PathType, Error> {
    let metadata = std::fs::metadata(path).map_err(|source| Error::InvalidPath {
        path: path.to_path_buf(),
        source,
    })?;

    let file_type = metadata.file_type();
    if file_type.is_file() {
        Ok(PathType::File)
    } else if file_type.is_dir() {
        Ok(PathType::Directory)
    } else {
        Err(Error::UnsupportedEntryType {
            path: path.to_path_buf(),
            kind: EntryKind::from(file_type),
            root: true,
        })
    }
}

/// List every regular file below `root` in file name order.
///
/// Symlinks below the root are never followed and come back as
/// `UnsupportedEntryType`, as does anything else that is not a file or a
/// directory. A directory that can't be read yields a single
/// `DirectoryOpenFailure` and its contents are skipped.
pub fn collect_entries(root: &Path) -> Vec<Result<PathBuf, Error>> {
    let mut entries = Vec::new();

    // The root has already been classified, and may be a symlink to a
    // directory, so only its contents are listed.
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                entries.push(Err(walk_error(err, root)));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            trace!("entering {}", entry.path().display());
        } else if file_type.is_file() {
            entries.push(Ok(entry.into_path()));
        } else {
            entries.push(Err(Error::UnsupportedEntryType {
                path: entry.into_path(),
                kind: EntryKind::from(file_type),
                root: false,
            }));
        }
    }

    entries
}

fn walk_error(err: walkdir::Error, root: &Path) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop"));
    entry_failure(path, source)
}

/// Blame the directory listing when `path` is a directory, otherwise the
/// lookup of the entry itself.
fn entry_failure(path: PathBuf, source: io::Error) -> Error {
    if std::fs::symlink_metadata(&path).is_ok_and(|metadata| metadata.is_dir()) {
        Error::DirectoryOpenFailure { path, source }
    } else {
        Error::MetadataFailure { path, source }
    }
}

/// Hash the file at `root`, or every file below it when it is a directory,
/// handing each result to `report` in traversal order.
///
/// Only problems with `root` itself are returned as errors. Failures for
/// individual entries are reported and traversal carries on.
pub fn hash_tree<F>(root: &Path, options: &Options, mut report: F) -> Result<(), Error>
where
    F: FnMut(FileReport),
{
    let entries = match classify(root)? {
        PathType::File => vec![Ok(root.to_path_buf())],
        PathType::Directory => collect_entries(root),
    };
    debug!("{} entries under {}", entries.len(), root.display());

    let read_size = options.read_size;
    if options.jobs == 1 {
        for entry in entries {
            report(hash_entry(entry, root, read_size));
        }
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()?;
    let reports: Vec<FileReport> = pool.install(|| {
        entries
            .into_par_iter()
            .map(|entry| hash_entry(entry, root, read_size))
            .collect()
    });
    reports.into_iter().for_each(report);
    Ok(())
}

fn hash_entry(entry: Result<PathBuf, Error>, root: &Path, read_size: usize) -> FileReport {
    match entry {
        Ok(path) => FileReport {
            outcome: hash_file(&path, read_size),
            path,
        },
        Err(err) => FileReport {
            path: err.path().unwrap_or(root).to_path_buf(),
            outcome: Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use rstest::rstest;

    fn reports_for(root: &Path, options: &Options) -> Vec<FileReport> {
        let mut reports = Vec::new();
        hash_tree(root, options, |report| reports.push(report)).unwrap();
        reports
    }

    struct InterruptOnce<'a> {
        data: &'a [u8],
        interrupted: bool,
    }

    impl Read for InterruptOnce<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.data.read(buf)
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(64)]
    #[case(DEFAULT_READ_SIZE)]
    fn hash_reader_is_independent_of_read_size(#[case] read_size: usize) {
        let data = b"12345678901234567890123456789012345678901234567890123456789012345678901234567890";

        let digest = hash_reader(&data[..], read_size).unwrap();

        assert_eq!(digest.to_hex(), "57edf4a22be3c955ac49da2e2107b67a");
    }

    #[test]
    fn hash_reader_retries_interrupted_reads() {
        let reader = InterruptOnce {
            data: b"abc",
            interrupted: false,
        };

        let digest = hash_reader(reader, 2).unwrap();

        assert_eq!(digest.to_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn directory_with_one_file_and_empty_subdirectory_yields_one_report() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.txt"), b"abc").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let reports = reports_for(dir.path(), &Options::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, dir.path().join("abc.txt"));
        let digest = reports[0].outcome.as_ref().unwrap();
        assert_eq!(digest.to_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn nested_files_are_reported_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b/inner/z.txt"), b"abc").unwrap();

        let paths: Vec<PathBuf> = reports_for(dir.path(), &Options::default())
            .into_iter()
            .map(|report| report.path)
            .collect();

        assert_eq!(
            paths,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("b/inner/z.txt"),
                dir.path().join("c.txt"),
            ]
        );
    }

    #[test]
    fn single_file_root_is_hashed_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let reports = reports_for(&path, &Options::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].outcome.as_ref().unwrap().to_hex(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn missing_root_is_a_fatal_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let mut called = false;
        let err = hash_tree(&missing, &Options::default(), |_| called = true).unwrap_err();

        assert!(matches!(err, Error::InvalidPath { .. }));
        assert!(err.is_fatal());
        assert!(!called);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_below_root_is_reported_without_stopping_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("b.lnk")).unwrap();
        fs::write(dir.path().join("c.txt"), b"abc").unwrap();

        let reports = reports_for(dir.path(), &Options::default());

        assert_eq!(reports.len(), 3);
        assert!(reports[0].outcome.is_ok());
        match &reports[1].outcome {
            Err(err @ Error::UnsupportedEntryType { kind, .. }) => {
                assert_eq!(*kind, EntryKind::Symlink);
                assert!(!err.is_fatal());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(reports[1].path, dir.path().join("b.lnk"));
        assert!(reports[2].outcome.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("target.txt"), b"abc").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("target.txt"), &link).unwrap();

        assert_eq!(classify(&link).unwrap(), PathType::File);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_directory_is_walked_without_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/a.txt"), b"abc").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("real"), &link).unwrap();

        let reports = reports_for(&link, &Options::default());

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, link.join("a.txt"));
        assert_eq!(
            reports[0].outcome.as_ref().unwrap().to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn hash_file_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.txt");

        let err = hash_file(&missing, DEFAULT_READ_SIZE).unwrap_err();

        assert!(matches!(err, Error::FileOpenFailure { .. }));
        assert_eq!(err.path(), Some(missing.as_path()));
        assert!(!err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_reported_and_siblings_hashed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked.txt");
        fs::write(&locked, b"secret").unwrap();
        fs::write(dir.path().join("z.txt"), b"abc").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(&locked).is_ok() {
            // Permission bits don't stop root.
            return;
        }

        let reports = reports_for(dir.path(), &Options::default());

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].path, locked);
        assert!(matches!(
            reports[0].outcome,
            Err(Error::FileOpenFailure { .. })
        ));
        assert!(reports[1].outcome.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_yields_one_failure_and_skips_its_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.txt"), b"hidden").unwrap();
        fs::write(dir.path().join("z.txt"), b"abc").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let reports = reports_for(dir.path(), &Options::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let paths: Vec<PathBuf> = reports.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                dir.path().join("a.txt"),
                locked.clone(),
                dir.path().join("z.txt"),
            ]
        );
        assert!(matches!(
            reports[1].outcome,
            Err(Error::DirectoryOpenFailure { .. })
        ));
        assert!(!reports[1].outcome.as_ref().unwrap_err().is_fatal());
    }

    #[test]
    fn entry_failure_blames_directories_and_other_entries_separately() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, b"a").unwrap();

        let dir_err = entry_failure(
            dir.path().to_path_buf(),
            io::ErrorKind::PermissionDenied.into(),
        );
        let file_err = entry_failure(file.clone(), io::ErrorKind::NotFound.into());
        let gone_err = entry_failure(dir.path().join("gone"), io::ErrorKind::NotFound.into());

        assert!(matches!(dir_err, Error::DirectoryOpenFailure { .. }));
        assert!(matches!(file_err, Error::MetadataFailure { .. }));
        assert!(matches!(gone_err, Error::MetadataFailure { .. }));
        assert!(file_err.to_string().contains("failed to read metadata"));
    }

    #[cfg(unix)]
    #[test]
    fn socket_root_is_a_fatal_unsupported_entry() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("md5gen.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let mut called = false;
        let err = hash_tree(&socket, &Options::default(), |_| called = true).unwrap_err();

        match &err {
            Error::UnsupportedEntryType { kind, root, .. } => {
                assert_eq!(*kind, EntryKind::Other);
                assert!(*root);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_fatal());
        assert!(!called);
    }

    #[cfg(unix)]
    #[test]
    fn socket_below_root_is_reported_without_stopping_siblings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        let socket = dir.path().join("b.sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();

        let reports = reports_for(dir.path(), &Options::default());

        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports[0].outcome.as_ref().unwrap().to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(reports[1].path, socket);
        match &reports[1].outcome {
            Err(err @ Error::UnsupportedEntryType { kind, .. }) => {
                assert_eq!(*kind, EntryKind::Other);
                assert!(!err.is_fatal());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(reports[2].outcome.is_ok());
    }

    #[test]
    fn parallel_hashing_keeps_traversal_order() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            let content = vec![i as u8; i * 97];
            fs::write(dir.path().join(format!("file{i:02}")), content).unwrap();
        }

        let sequential = reports_for(dir.path(), &Options::default());
        let parallel = reports_for(
            dir.path(),
            &Options {
                jobs: 4,
                ..Options::default()
            },
        );

        assert_eq!(sequential.len(), 20);
        for (seq, par) in sequential.iter().zip(&parallel) {
            assert_eq!(seq.path, par.path);
            assert_eq!(
                seq.outcome.as_ref().unwrap(),
                par.outcome.as_ref().unwrap()
            );
        }
    }
}
