//! Recursive traversal shapes shared by every backend: existence asserts,
//! parent creation, child deletion, tree download and transfer-target
//! resolution, all expressed through the [`Connector`] contract itself so
//! the two protocol families cannot drift apart.

use common::errors::{Error, Result};
use common::localfs::LocalFs;
use tracing::instrument;

use crate::path;
use crate::{Connector, Predicate};

#[derive(Copy, Clone, Debug, Default)]
pub struct TransferSummary {
    pub bytes_transferred: u64,
    pub files_transferred: usize,
    pub directories_created: usize,
}

impl std::ops::Add for TransferSummary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
            files_transferred: self.files_transferred + other.files_transferred,
            directories_created: self.directories_created + other.directories_created,
        }
    }
}

impl std::fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes transferred: {}\n\
            files transferred: {}\n\
            directories created: {}",
            bytesize::ByteSize(self.bytes_transferred),
            self.files_transferred,
            self.directories_created,
        )
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RemoveSummary {
    pub files_removed: usize,
    pub directories_removed: usize,
}

impl std::ops::Add for RemoveSummary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_removed: self.files_removed + other.files_removed,
            directories_removed: self.directories_removed + other.directories_removed,
        }
    }
}

impl std::fmt::Display for RemoveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files removed: {}\n\
            directories removed: {}",
            self.files_removed, self.directories_removed,
        )
    }
}

pub fn assert_exists(conn: &mut dyn Connector, path: &str) -> Result<()> {
    if conn.exists(path)? {
        Ok(())
    } else {
        Err(Error::NotFound(path.to_string()))
    }
}

/// Make sure the parent directory of `path` exists, creating it (and its
/// ancestors, recursing through the contract's own `create`) when allowed.
/// Directory creation always brings ancestors into existence; file creation
/// requires `create_parents`.
pub fn ensure_parent(
    conn: &mut dyn Connector,
    path: &str,
    make_dir: bool,
    create_parents: bool,
) -> Result<()> {
    let parent = path::parent(path);
    if conn.exists(&parent)? {
        return Ok(());
    }
    if !make_dir && !create_parents {
        return Err(Error::PredicateUnmet(format!(
            "parent directory '{}' of '{}' is missing and creating parent directories was not requested",
            parent, path
        )));
    }
    conn.create(&parent, true, create_parents)
}

/// Delete every entry of a directory through the contract, so files and
/// whole subtrees are handled alike.
pub fn delete_children(conn: &mut dyn Connector, path: &str) -> Result<RemoveSummary> {
    let mut summary = RemoveSummary::default();
    for entry in conn.list_files(path)? {
        summary = summary + conn.delete(&entry, true)?;
    }
    Ok(summary)
}

/// Download the directory at `path` into the existing local directory
/// `local_path`, creating one local subdirectory named after the remote
/// basename. The predicate filters entries before the descend decision: a
/// directory it rejects is never explored.
#[instrument(skip(conn, predicate))]
pub fn download_dir(
    conn: &mut dyn Connector,
    path: &str,
    local_path: &std::path::Path,
    mut predicate: Option<Predicate>,
    recursive: bool,
) -> Result<TransferSummary> {
    assert_exists(conn, path)?;
    if !conn.is_directory(path)? {
        return Err(Error::WrongKind(format!(
            "'{}' is not a directory, use a plain file download",
            path
        )));
    }
    LocalFs::new(local_path).assert_is_directory()?;
    let local_sub = local_path.join(path::basename(path));
    LocalFs::new(&local_sub).create_directory()?;
    let mut summary = TransferSummary {
        directories_created: 1,
        ..Default::default()
    };
    for entry in conn.list_files(path)? {
        if let Some(pred) = predicate.as_mut() {
            if !pred(&entry, &mut *conn)? {
                tracing::debug!("skipping '{}', rejected by predicate", entry);
                continue;
            }
        }
        if conn.is_directory(&entry)? {
            if recursive {
                let sub_predicate: Option<Predicate> =
                    predicate.as_mut().map(|pred| &mut **pred as Predicate);
                summary = summary + download_dir(conn, &entry, &local_sub, sub_predicate, true)?;
            } else {
                tracing::debug!("skipping directory '{}', not a recursive download", entry);
            }
        } else {
            summary.bytes_transferred += conn.download_file(&entry, &local_sub)?;
            summary.files_transferred += 1;
        }
    }
    Ok(summary)
}

/// Where an upload of a local file named `local_name` onto the remote `path`
/// must land: into an existing directory under the local basename, over an
/// existing file only with `update`, or at `path` itself when its parent
/// exists.
pub fn upload_target(
    conn: &mut dyn Connector,
    path: &str,
    local_name: &str,
    update: bool,
) -> Result<String> {
    if conn.exists(path)? {
        if conn.is_directory(path)? {
            return Ok(path::join(path, local_name));
        }
        if update {
            return Ok(path.to_string());
        }
        return Err(Error::WrongKind(format!(
            "'{}' already exists, pass update to overwrite it",
            path
        )));
    }
    let parent = path::parent(path);
    if conn.exists(&parent)? {
        Ok(path.to_string())
    } else {
        Err(Error::NotFound(parent))
    }
}

/// Where a download of the remote file named `remote_name` must land
/// locally: under an existing directory, over an existing file, or at the
/// missing `local_path` itself when its parent directory exists.
pub fn download_target(
    local_path: &std::path::Path,
    remote_name: &str,
) -> Result<std::path::PathBuf> {
    if local_path.is_dir() {
        return Ok(local_path.join(remote_name));
    }
    if local_path.exists() {
        return Ok(local_path.to_path_buf());
    }
    match local_path.parent() {
        // a bare relative name resolves against the current directory
        Some(parent) if parent.as_os_str().is_empty() => Ok(local_path.to_path_buf()),
        Some(parent) => {
            LocalFs::new(parent).assert_is_directory()?;
            Ok(local_path.to_path_buf())
        }
        None => Err(Error::NotFound(local_path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    #[test]
    fn test_transfer_summary_add_and_display() {
        let first = TransferSummary {
            bytes_transferred: 100,
            files_transferred: 1,
            directories_created: 1,
        };
        let second = TransferSummary {
            bytes_transferred: 200,
            files_transferred: 2,
            directories_created: 0,
        };
        let total = first + second;
        assert_eq!(total.bytes_transferred, 300);
        assert_eq!(total.files_transferred, 3);
        assert_eq!(
            format!("{}", &total),
            "bytes transferred: 300 B\nfiles transferred: 3\ndirectories created: 1"
        );
    }

    #[test]
    fn test_remove_summary_display() {
        let summary = RemoveSummary {
            files_removed: 4,
            directories_removed: 2,
        };
        assert_eq!(
            format!("{}", &summary),
            "files removed: 4\ndirectories removed: 2"
        );
    }

    #[test]
    fn test_download_target_into_directory() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let target = download_target(&tmp_dir, "in.csv").unwrap();
        assert_eq!(target, tmp_dir.join("in.csv"));
    }

    #[test]
    fn test_download_target_overwrites_existing_file() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let file = tmp_dir.join("out.csv");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(download_target(&file, "in.csv").unwrap(), file);
    }

    #[test]
    fn test_download_target_missing_with_existing_parent() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let target = tmp_dir.join("fresh.csv");
        assert_eq!(download_target(&target, "in.csv").unwrap(), target);
    }

    #[test]
    fn test_download_target_missing_parent() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let target = tmp_dir.join("nope").join("fresh.csv");
        match download_target(&target, "in.csv") {
            Err(Error::NotFound(path)) => assert!(path.ends_with("nope")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
