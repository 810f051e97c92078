//! Local-filesystem staging helper used when uploads read from or downloads
//! land on the local disk.

use anyhow::Context;

use crate::errors::{Error, Result};

/// Checks and staging operations for one local path.
#[derive(Debug, Clone)]
pub struct LocalFs {
    path: std::path::PathBuf,
}

impl LocalFs {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        LocalFs { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    pub fn assert_exists(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(Error::NotFound(self.path.display().to_string()))
        }
    }

    pub fn assert_is_directory(&self) -> Result<()> {
        self.assert_exists()?;
        if self.is_directory() {
            Ok(())
        } else {
            Err(Error::WrongKind(format!(
                "'{}' is not a directory",
                self.path.display()
            )))
        }
    }

    /// Create this directory and any missing ancestors; an already existing
    /// directory is not an error.
    pub fn create_directory(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("failed creating directory {:?}", &self.path))?;
        Ok(())
    }

    /// Size in bytes: file length for files, recursive content size for
    /// directories.
    pub fn size(&self) -> Result<u64> {
        self.assert_exists()?;
        dir_entry_size(&self.path)
    }
}

fn dir_entry_size(path: &std::path::Path) -> Result<u64> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed reading metadata from {:?}", path))?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    let entries = std::fs::read_dir(path)
        .with_context(|| format!("cannot open directory {:?} for reading", path))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed traversing directory {:?}", path))?;
        total += dir_entry_size(&entry.path())?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::testutils;

    #[test]
    fn test_missing_path_reports_not_found() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let staging = LocalFs::new(tmp_dir.join("no-such-entry"));
        assert!(!staging.exists());
        match staging.assert_exists() {
            Err(Error::NotFound(path)) => assert!(path.ends_with("no-such-entry")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_assert_is_directory_on_file() {
        let tmp_dir = testutils::setup_test_dir().unwrap();
        let staging = LocalFs::new(tmp_dir.join("foo").join("0.txt"));
        match staging.assert_is_directory() {
            Err(Error::WrongKind(message)) => assert!(message.contains("not a directory")),
            other => panic!("expected WrongKind, got {:?}", other),
        }
    }

    #[test]
    fn test_create_directory_is_idempotent() {
        let tmp_dir = testutils::create_temp_dir().unwrap();
        let staging = LocalFs::new(tmp_dir.join("a").join("b"));
        staging.create_directory().unwrap();
        staging.create_directory().unwrap();
        assert!(staging.is_directory());
    }

    #[test]
    fn test_size_of_tree() {
        let tmp_dir = testutils::setup_test_dir().unwrap();
        // six files holding one byte each
        assert_eq!(LocalFs::new(tmp_dir.join("foo")).size().unwrap(), 6);
        assert_eq!(
            LocalFs::new(tmp_dir.join("foo").join("0.txt")).size().unwrap(),
            1
        );
    }
}
