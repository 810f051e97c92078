use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use common::errors::{Error, Result};

use crate::ftp::FtpTransport;
use crate::path;
use crate::sftp::{RemoteStat, SftpTransport};

pub fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("rfs_connector_test{}", &idx));
        if let Err(error) = std::fs::create_dir(&tmp_dir) {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

fn refused(what: &str) -> Error {
    Error::Connector(format!("server refused {}", what))
}

/// In-memory remote tree shared by the fake transports.
#[derive(Debug, Default)]
pub struct FakeTree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl FakeTree {
    pub fn add_dir(&mut self, dir_path: &str) {
        self.dirs.insert(path::normalize(dir_path));
    }

    pub fn add_file(&mut self, file_path: &str, contents: &[u8]) {
        self.files
            .insert(path::normalize(file_path), contents.to_vec());
    }

    pub fn is_dir(&self, dir_path: &str) -> bool {
        dir_path == "/" || self.dirs.contains(dir_path)
    }

    pub fn is_file(&self, file_path: &str) -> bool {
        self.files.contains_key(file_path)
    }

    pub fn exists(&self, any_path: &str) -> bool {
        self.is_dir(any_path) || self.is_file(any_path)
    }

    pub fn file(&self, file_path: &str) -> Option<&Vec<u8>> {
        self.files.get(file_path)
    }

    pub fn children(&self, dir_path: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .dirs
            .iter()
            .chain(self.files.keys())
            .filter(|entry| path::parent(entry) == dir_path && entry.as_str() != dir_path)
            .cloned()
            .collect();
        children.sort();
        children
    }

    pub fn remove_file(&mut self, file_path: &str) -> bool {
        self.files.remove(file_path).is_some()
    }

    pub fn remove_dir(&mut self, dir_path: &str) -> bool {
        self.dirs.remove(dir_path)
    }
}

/// The tree from the download scenario tests: a 10-byte and a 5-byte file,
/// the latter one level down.
pub fn seed_base_tree(tree: &mut FakeTree) {
    tree.add_dir("/base");
    tree.add_file("/base/a.txt", b"0123456789");
    tree.add_dir("/base/sub");
    tree.add_file("/base/sub/b.txt", b"01234");
}

#[derive(Debug)]
pub struct FakeFtpState {
    pub tree: FakeTree,
    pub cwd: String,
    /// reply to NLST with bare names instead of full paths
    pub bare_nlst: bool,
    /// reply to LIST with DOS-format lines instead of Unix-style ones
    pub dos_list: bool,
    /// modification time reported for files by MDTM
    pub mdtm: Option<DateTime<Utc>>,
    pub quit_called: bool,
    /// paths NLST was asked for, in order
    pub nlst_log: Vec<String>,
}

impl Default for FakeFtpState {
    fn default() -> Self {
        Self {
            tree: FakeTree::default(),
            cwd: "/".to_string(),
            bare_nlst: false,
            dos_list: false,
            mdtm: None,
            quit_called: false,
            nlst_log: Vec::new(),
        }
    }
}

/// Fake FTP wire: a shared-state stand-in for a server session, refusing
/// requests the way a real server would (missing paths, non-empty rmdir).
pub struct FakeFtpTransport {
    pub state: Rc<RefCell<FakeFtpState>>,
}

impl FtpTransport for FakeFtpTransport {
    fn cwd(&mut self, dir_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.tree.is_dir(dir_path) {
            state.cwd = dir_path.to_string();
            Ok(())
        } else {
            Err(refused(&format!("changing directory to '{}'", dir_path)))
        }
    }

    fn mkdir(&mut self, dir_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.tree.exists(dir_path) {
            return Err(refused(&format!("creating existing '{}'", dir_path)));
        }
        if !state.tree.is_dir(&path::parent(dir_path)) {
            return Err(refused(&format!(
                "creating '{}' under a missing directory",
                dir_path
            )));
        }
        state.tree.add_dir(dir_path);
        Ok(())
    }

    fn rmdir(&mut self, dir_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.tree.is_dir(dir_path) {
            return Err(refused(&format!("removing directory '{}'", dir_path)));
        }
        if !state.tree.children(dir_path).is_empty() {
            return Err(refused(&format!(
                "removing non-empty directory '{}'",
                dir_path
            )));
        }
        state.tree.remove_dir(dir_path);
        Ok(())
    }

    fn remove_file(&mut self, file_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.tree.remove_file(file_path) {
            Ok(())
        } else {
            Err(refused(&format!("removing file '{}'", file_path)))
        }
    }

    fn nlst(&mut self, any_path: &str) -> Result<Vec<String>> {
        let mut state = self.state.borrow_mut();
        state.nlst_log.push(any_path.to_string());
        if state.tree.is_dir(any_path) {
            let children = state.tree.children(any_path);
            if state.bare_nlst {
                return Ok(children.iter().map(|child| path::basename(child)).collect());
            }
            return Ok(children);
        }
        if state.tree.is_file(any_path) {
            if state.bare_nlst {
                return Ok(vec![path::basename(any_path)]);
            }
            return Ok(vec![any_path.to_string()]);
        }
        Err(refused(&format!("listing '{}'", any_path)))
    }

    fn list(&mut self, any_path: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        let line = |entry: &str| {
            if state.dos_list {
                return if state.tree.is_dir(entry) {
                    format!("01-16-02  11:14AM       <DIR>          {}", path::basename(entry))
                } else {
                    let size = state.tree.file(entry).map(Vec::len).unwrap_or(0);
                    format!("04-14-03  03:47PM {:>20} {}", size, path::basename(entry))
                };
            }
            if state.tree.is_dir(entry) {
                format!("drwxr-xr-x 2 ftp ftp 0 Jan 01 12:00 {}", path::basename(entry))
            } else {
                let size = state.tree.file(entry).map(Vec::len).unwrap_or(0);
                format!(
                    "-rw-r--r-- 1 ftp ftp {} Jan 01 12:00 {}",
                    size,
                    path::basename(entry)
                )
            }
        };
        if state.tree.is_dir(any_path) {
            return Ok(state
                .tree
                .children(any_path)
                .iter()
                .map(|child| line(child))
                .collect());
        }
        if state.tree.is_file(any_path) {
            return Ok(vec![line(any_path)]);
        }
        Err(refused(&format!("listing '{}'", any_path)))
    }

    fn mdtm(&mut self, file_path: &str) -> Result<DateTime<Utc>> {
        let state = self.state.borrow();
        if !state.tree.is_file(file_path) {
            return Err(refused(&format!("MDTM of '{}'", file_path)));
        }
        state
            .mdtm
            .ok_or_else(|| refused(&format!("MDTM of '{}'", file_path)))
    }

    fn size(&mut self, file_path: &str) -> Result<u64> {
        let state = self.state.borrow();
        match state.tree.file(file_path) {
            Some(contents) => Ok(contents.len() as u64),
            None => Err(refused(&format!("SIZE of '{}'", file_path))),
        }
    }

    fn retrieve(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64> {
        let state = self.state.borrow();
        match state.tree.file(file_path) {
            Some(contents) => {
                writer.write_all(contents)?;
                Ok(contents.len() as u64)
            }
            None => Err(refused(&format!("retrieving '{}'", file_path))),
        }
    }

    fn store(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        if !state.tree.is_dir(&path::parent(file_path)) {
            return Err(refused(&format!(
                "storing '{}' under a missing directory",
                file_path
            )));
        }
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        let bytes = contents.len() as u64;
        state.tree.add_file(file_path, &contents);
        Ok(bytes)
    }

    fn quit(&mut self) -> Result<()> {
        self.state.borrow_mut().quit_called = true;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeSftpState {
    pub tree: FakeTree,
    /// modification time reported by stat for every entry
    pub mtime: Option<DateTime<Utc>>,
    pub uid: Option<u32>,
    /// raw stat size reported for directories (servers report block sizes)
    pub dir_size: u64,
    /// server-side path resolutions beyond the identity
    pub realpath_map: BTreeMap<String, String>,
    pub disconnected: bool,
}

impl Default for FakeSftpState {
    fn default() -> Self {
        Self {
            tree: FakeTree::default(),
            mtime: None,
            uid: None,
            dir_size: 4096,
            realpath_map: BTreeMap::new(),
            disconnected: false,
        }
    }
}

/// Fake SFTP wire: stat-based stand-in mirroring the subsystem's behavior
/// (stat of a missing path reports "not there", not a transport failure).
pub struct FakeSftpTransport {
    pub state: Rc<RefCell<FakeSftpState>>,
}

impl FakeSftpTransport {
    fn stat_of(state: &FakeSftpState, any_path: &str) -> Option<RemoteStat> {
        if state.tree.is_dir(any_path) {
            return Some(RemoteStat {
                is_dir: true,
                size: state.dir_size,
                mtime: state.mtime,
                owner: state.uid.map(|uid| uid.to_string()),
            });
        }
        state.tree.file(any_path).map(|contents| RemoteStat {
            is_dir: false,
            size: contents.len() as u64,
            mtime: state.mtime,
            owner: state.uid.map(|uid| uid.to_string()),
        })
    }
}

impl SftpTransport for FakeSftpTransport {
    fn stat(&mut self, any_path: &str) -> Result<Option<RemoteStat>> {
        let state = self.state.borrow();
        Ok(Self::stat_of(&state, any_path))
    }

    fn readdir(&mut self, dir_path: &str) -> Result<Vec<(String, RemoteStat)>> {
        let state = self.state.borrow();
        if !state.tree.is_dir(dir_path) {
            return Err(refused(&format!("listing '{}'", dir_path)));
        }
        Ok(state
            .tree
            .children(dir_path)
            .into_iter()
            .map(|child| {
                let stat = Self::stat_of(&state, &child).expect("child of a fake dir must stat");
                (child, stat)
            })
            .collect())
    }

    fn mkdir(&mut self, dir_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.tree.exists(dir_path) {
            return Err(refused(&format!("creating existing '{}'", dir_path)));
        }
        if !state.tree.is_dir(&path::parent(dir_path)) {
            return Err(refused(&format!(
                "creating '{}' under a missing directory",
                dir_path
            )));
        }
        state.tree.add_dir(dir_path);
        Ok(())
    }

    fn rmdir(&mut self, dir_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.tree.is_dir(dir_path) {
            return Err(refused(&format!("removing directory '{}'", dir_path)));
        }
        if !state.tree.children(dir_path).is_empty() {
            return Err(refused(&format!(
                "removing non-empty directory '{}'",
                dir_path
            )));
        }
        state.tree.remove_dir(dir_path);
        Ok(())
    }

    fn unlink(&mut self, file_path: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.tree.remove_file(file_path) {
            Ok(())
        } else {
            Err(refused(&format!("removing file '{}'", file_path)))
        }
    }

    fn realpath(&mut self, any_path: &str) -> Result<String> {
        let state = self.state.borrow();
        if let Some(resolved) = state.realpath_map.get(any_path) {
            return Ok(resolved.clone());
        }
        if state.tree.exists(any_path) || any_path == "/" {
            Ok(any_path.to_string())
        } else {
            Err(refused(&format!("resolving '{}'", any_path)))
        }
    }

    fn download(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64> {
        let state = self.state.borrow();
        match state.tree.file(file_path) {
            Some(contents) => {
                writer.write_all(contents)?;
                Ok(contents.len() as u64)
            }
            None => Err(refused(&format!("opening '{}'", file_path))),
        }
    }

    fn upload(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        if !state.tree.is_dir(&path::parent(file_path)) {
            return Err(refused(&format!(
                "creating '{}' under a missing directory",
                file_path
            )));
        }
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        let bytes = contents.len() as u64;
        state.tree.add_file(file_path, &contents);
        Ok(bytes)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.state.borrow_mut().disconnected = true;
        Ok(())
    }
}
