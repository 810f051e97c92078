//! Client facade: a remote path paired with a shared connector session.
//!
//! Tree operations hand out further [`Client`] values for the entries they
//! find, all sharing one session, so a directory can be walked without ever
//! naming the protocol. Borrow the connector only for the duration of a
//! single call; predicates receive the connector they run under instead of
//! capturing a client of their own.

use std::cell::RefCell;
use std::rc::Rc;

use common::errors::Result;
use common::FileDescriptor;

use crate::walk::{RemoveSummary, TransferSummary};
use crate::{path, Connector, Predicate};

/// A remote path bound to an open [`Connector`] session.
#[derive(Clone)]
pub struct Client {
    path: String,
    connector: Rc<RefCell<dyn Connector>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("path", &self.path).finish()
    }
}

impl Client {
    pub fn new(path: &str, connector: Rc<RefCell<dyn Connector>>) -> Self {
        Client {
            path: path::normalize(path),
            connector,
        }
    }

    /// The (normalized) remote path this client is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn child(&self, path: &str) -> Client {
        Client {
            path: path::normalize(path),
            connector: self.connector.clone(),
        }
    }

    pub fn exists(&self) -> Result<bool> {
        self.connector.borrow_mut().exists(&self.path)
    }

    pub fn is_directory(&self) -> Result<bool> {
        self.connector.borrow_mut().is_directory(&self.path)
    }

    pub fn size(&self) -> Result<u64> {
        self.connector.borrow_mut().size(&self.path)
    }

    /// Children of a directory as clients on the same session; a client
    /// bound to a file lists as itself.
    pub fn list_files(&self) -> Result<Vec<Client>> {
        let entries = self.connector.borrow_mut().list_files(&self.path)?;
        Ok(entries.into_iter().map(|entry| self.child(&entry)).collect())
    }

    pub fn create(&self, make_dir: bool, create_parents: bool) -> Result<()> {
        self.connector
            .borrow_mut()
            .create(&self.path, make_dir, create_parents)
    }

    pub fn delete(&self, recursive: bool) -> Result<RemoveSummary> {
        self.connector.borrow_mut().delete(&self.path, recursive)
    }

    pub fn upload(&self, local_path: &std::path::Path, update: bool) -> Result<u64> {
        self.connector
            .borrow_mut()
            .upload(&self.path, local_path, update)
    }

    pub fn download_file(&self, local_path: &std::path::Path) -> Result<u64> {
        self.connector
            .borrow_mut()
            .download_file(&self.path, local_path)
    }

    pub fn download_dir(
        &self,
        local_path: &std::path::Path,
        predicate: Option<Predicate>,
        recursive: bool,
    ) -> Result<TransferSummary> {
        self.connector
            .borrow_mut()
            .download_dir(&self.path, local_path, predicate, recursive)
    }

    /// Client bound to the parent directory of this (existing) path.
    pub fn base_dir(&self) -> Result<Client> {
        let parent = self.connector.borrow_mut().base_dir(&self.path)?;
        Ok(self.child(&parent))
    }

    pub fn get_description(&self) -> Result<FileDescriptor> {
        self.connector.borrow_mut().get_description(&self.path)
    }

    pub fn modification_time(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.connector.borrow_mut().modification_time(&self.path)
    }

    /// Release the session shared by this client and all of its children.
    pub fn close(&self) -> Result<()> {
        self.connector.borrow_mut().close()
    }
}

pub struct ClientIter {
    entries: std::vec::IntoIter<Result<Client>>,
}

impl Iterator for ClientIter {
    type Item = Result<Client>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

/// Iterating a client walks its immediate children (a file yields itself);
/// a failed listing yields the failure as the only item.
impl IntoIterator for &Client {
    type Item = Result<Client>;
    type IntoIter = ClientIter;

    fn into_iter(self) -> ClientIter {
        let entries = match self.list_files() {
            Ok(children) => children.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(error) => vec![Err(error)],
        };
        ClientIter {
            entries: entries.into_iter(),
        }
    }
}
