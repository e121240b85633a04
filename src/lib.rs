//! MD5 digests for files and directory trees.
mod digest;
mod error;
mod hash;
mod md5;

pub mod app;
pub mod cli;
pub mod walk;

pub use digest::{to_hex, Digest, DIGEST_LEN};
pub use error::{EntryKind, Error};
pub use hash::Hasher;
pub use md5::Md5;
