//! Uniform remote-filesystem client over FTP, FTPS and SFTP.
//!
//! The [`Connector`] trait is the capability contract: existence and kind
//! checks, metadata, listing, create/delete, uploads and downloads. Protocol
//! backends ([`FtpConnector`], [`SftpConnector`]) implement it over a thin
//! transport trait that isolates the wire library, and the [`Client`] facade
//! pairs a remote path with a shared connector so tree operations can hand
//! out child clients. Sessions are single-threaded; open one per worker when
//! parallelism is needed.

pub mod client;
pub mod ftp;
pub mod ftps;
pub mod path;
pub mod sftp;
pub mod walk;

#[cfg(test)]
mod testutils;

pub use client::Client;
pub use ftp::{ftp_client, FtpConnector, FtpSettings};
pub use ftps::{ftps_client, DataProtection, FtpsSettings};
pub use sftp::{sftp_client, SftpConnector, SftpSettings};
pub use walk::{RemoveSummary, TransferSummary};

use common::errors::Result;
use common::FileDescriptor;

/// Filter callback applied to directory entries during recursive downloads.
///
/// Receives the entry's full remote path and the connector (so it can ask,
/// say, [`Connector::is_directory`]). Returning `false` skips the entry; a
/// skipped directory is never descended into.
pub type Predicate<'a> = &'a mut dyn FnMut(&str, &mut dyn Connector) -> Result<bool>;

/// One authenticated session to a remote filesystem.
///
/// Every operation normalizes its path argument (trailing slashes stripped,
/// empty string means the root) and either returns a well-typed value or a
/// [`common::errors::Error`]; there are no silent fallbacks and no retries.
/// Operations that require the path to exist raise
/// [`common::errors::Error::NotFound`] when it does not.
pub trait Connector {
    /// Whether the path exists. Missing paths (including paths under a
    /// missing parent) are `Ok(false)`; only connection-level failures are
    /// errors. The root always exists.
    fn exists(&mut self, path: &str) -> Result<bool>;

    fn is_directory(&mut self, path: &str) -> Result<bool>;

    /// Size in bytes; directories report 0 on every backend.
    fn size(&mut self, path: &str) -> Result<u64>;

    /// Full paths of a directory's entries; listing a file yields the file
    /// itself.
    fn list_files(&mut self, path: &str) -> Result<Vec<String>>;

    /// Create a directory (`make_dir`) or an empty file. Directories bring
    /// their missing ancestors into existence; for files that requires
    /// `create_parents`, otherwise a missing ancestor raises
    /// [`common::errors::Error::PredicateUnmet`]. Creating over an existing
    /// path raises [`common::errors::Error::WrongKind`].
    fn create(&mut self, path: &str, make_dir: bool, create_parents: bool) -> Result<()>;

    /// Delete a file, an empty directory, or (with `recursive`) a whole
    /// tree. Removing a non-empty directory without `recursive` fails with
    /// whatever the server replies.
    fn delete(&mut self, path: &str, recursive: bool) -> Result<RemoveSummary>;

    /// Upload a local file. An existing remote directory stores under the
    /// local basename; an existing remote file is only overwritten with
    /// `update`; a missing remote path requires its parent to exist.
    /// Returns the bytes transferred.
    fn upload(&mut self, path: &str, local_path: &std::path::Path, update: bool) -> Result<u64>;

    /// Download one remote file. The local target may be an existing
    /// directory (lands under the remote basename), an existing file
    /// (overwritten), or a missing path whose parent directory exists.
    /// Returns the bytes transferred.
    fn download_file(&mut self, path: &str, local_path: &std::path::Path) -> Result<u64>;

    /// Download a remote directory into an existing local directory,
    /// creating one local subdirectory named after the remote basename.
    /// Entries failing the predicate are skipped before any descend
    /// decision; subdirectories are only entered with `recursive`.
    fn download_dir(
        &mut self,
        path: &str,
        local_path: &std::path::Path,
        predicate: Option<Predicate>,
        recursive: bool,
    ) -> Result<TransferSummary>;

    /// Parent directory of the (existing) path.
    fn base_dir(&mut self, path: &str) -> Result<String>;

    fn get_description(&mut self, path: &str) -> Result<FileDescriptor>;

    fn modification_time(
        &mut self,
        path: &str,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(self.get_description(path)?.update_date)
    }

    /// Release the underlying session; the connector must not be used
    /// afterwards. Dropping without `close` leaks the session to the
    /// server's idle timeout.
    fn close(&mut self) -> Result<()>;
}
