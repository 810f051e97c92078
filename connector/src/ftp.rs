//! Plain/secured FTP backend.
//!
//! FTP has no native notion of "is this a directory", so the connector
//! synthesizes one: existence comes from listing the parent directory,
//! directory detection from a `CWD` probe that always restores the working
//! directory to the root, and file metadata from `MDTM` plus the one place
//! raw listing text is parsed, the Unix-style `LIST` line of the file
//! (`SIZE` when the server lists in another format). The [`FtpTransport`]
//! trait isolates the wire library; [`FtpSession`] adapts `suppaftp`
//! streams (plain or TLS-secured) onto it.

use anyhow::Context;
use chrono::{DateTime, Utc};
use common::errors::{Error, Result};
use common::localfs::LocalFs;
use common::FileDescriptor;

use crate::walk::{RemoveSummary, TransferSummary};
use crate::{path, walk, Client, Connector, Predicate};

/// Session parameters for [`ftp_client`].
#[derive(Clone, Debug)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    /// passive-mode data connections (active when false)
    pub passive: bool,
}

/// The FTP control/data primitives the connector algorithms need, already
/// authenticated. A refused request (negative completion reply) surfaces as
/// [`Error::Connector`]; transport failures as [`Error::Other`].
pub trait FtpTransport {
    fn cwd(&mut self, dir_path: &str) -> Result<()>;
    fn mkdir(&mut self, dir_path: &str) -> Result<()>;
    fn rmdir(&mut self, dir_path: &str) -> Result<()>;
    fn remove_file(&mut self, file_path: &str) -> Result<()>;
    fn nlst(&mut self, any_path: &str) -> Result<Vec<String>>;
    fn list(&mut self, any_path: &str) -> Result<Vec<String>>;
    fn mdtm(&mut self, file_path: &str) -> Result<DateTime<Utc>>;
    fn size(&mut self, file_path: &str) -> Result<u64>;
    fn retrieve(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64>;
    fn store(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64>;
    fn quit(&mut self) -> Result<()>;
}

/// [`Connector`] over any [`FtpTransport`]; plain and TLS-secured sessions
/// share this type and differ only in session establishment.
pub struct FtpConnector<T> {
    transport: T,
}

impl<T: FtpTransport> FtpConnector<T> {
    pub fn new(transport: T) -> Self {
        FtpConnector { transport }
    }

    /// CWD probe with a guaranteed restore: whatever the probe said, the
    /// session's working directory is moved back to the root before the
    /// verdict is returned.
    fn probe_directory(&mut self, dir_path: &str) -> Result<bool> {
        let probe = self.transport.cwd(dir_path);
        let restore = self.transport.cwd("/");
        let verdict = match probe {
            Ok(()) => true,
            Err(Error::Connector(_)) => false,
            Err(error) => return Err(error),
        };
        restore?;
        Ok(verdict)
    }

    /// Size of a file taken from the Unix-style `LIST` line of its parent
    /// directory whose final field matches the basename. Servers replying
    /// in another listing format (DOS-style lines carry no mode or link
    /// columns) get a `SIZE` query instead.
    fn listed_size(&mut self, file_path: &str) -> Result<u64> {
        let name = path::basename(file_path);
        for line in self.transport.list(&path::parent(file_path))? {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 9 || tokens.last() != Some(&name.as_str()) {
                continue;
            }
            if let Ok(size) = tokens[4].parse::<u64>() {
                return Ok(size);
            }
        }
        self.transport.size(file_path)
    }
}

impl<T: FtpTransport> Connector for FtpConnector<T> {
    fn exists(&mut self, path: &str) -> Result<bool> {
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Ok(true);
        }
        // membership in the parent's name listing; a refused listing (for
        // instance a missing parent) simply means the path is not there
        let listing = match self.transport.nlst(&path::parent(&path)) {
            Ok(listing) => listing,
            Err(Error::Connector(_)) => return Ok(false),
            Err(error) => return Err(error),
        };
        let name = path::basename(&path);
        Ok(listing.iter().any(|entry| {
            let entry = entry.trim_end_matches('/');
            entry == path.as_str() || entry == name.as_str()
        }))
    }

    fn is_directory(&mut self, path: &str) -> Result<bool> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        self.probe_directory(&path)
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        if self.probe_directory(&path)? {
            return Ok(0);
        }
        self.transport.size(&path)
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<String>> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        if !self.probe_directory(&path)? {
            return Ok(vec![path]);
        }
        let entries = self.transport.nlst(&path)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = entry.trim_end_matches('/');
                if entry.contains('/') {
                    path::normalize(entry)
                } else {
                    path::join(&path, entry)
                }
            })
            .collect())
    }

    fn create(&mut self, path: &str, make_dir: bool, create_parents: bool) -> Result<()> {
        let path = path::normalize(path);
        if self.exists(&path)? {
            return Err(Error::WrongKind(format!("'{}' already exists", path)));
        }
        walk::ensure_parent(self, &path, make_dir, create_parents)?;
        if make_dir {
            tracing::debug!("creating directory '{}'", path);
            self.transport.mkdir(&path)
        } else {
            tracing::debug!("creating empty file '{}'", path);
            let mut empty = std::io::empty();
            self.transport.store(&path, &mut empty)?;
            Ok(())
        }
    }

    fn delete(&mut self, path: &str, recursive: bool) -> Result<RemoveSummary> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        if self.probe_directory(&path)? {
            let mut summary = RemoveSummary::default();
            if recursive {
                summary = walk::delete_children(self, &path)?;
            }
            tracing::debug!("removing directory '{}'", path);
            self.transport.rmdir(&path)?;
            summary.directories_removed += 1;
            Ok(summary)
        } else {
            tracing::debug!("removing file '{}'", path);
            self.transport.remove_file(&path)?;
            Ok(RemoveSummary {
                files_removed: 1,
                ..Default::default()
            })
        }
    }

    fn upload(&mut self, path: &str, local_path: &std::path::Path, update: bool) -> Result<u64> {
        let path = path::normalize(path);
        let staging = LocalFs::new(local_path);
        staging.assert_exists()?;
        if staging.is_directory() {
            return Err(Error::WrongKind(format!(
                "'{}' is a directory, only files can be uploaded",
                local_path.display()
            )));
        }
        let local_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::WrongKind(format!("'{}' has no file name", local_path.display()))
            })?;
        let target = walk::upload_target(self, &path, &local_name, update)?;
        let mut reader = std::fs::File::open(local_path)
            .with_context(|| format!("failed opening {:?} for reading", local_path))?;
        tracing::debug!("storing '{}'", target);
        self.transport.store(&target, &mut reader)
    }

    fn download_file(&mut self, path: &str, local_path: &std::path::Path) -> Result<u64> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        if self.probe_directory(&path)? {
            return Err(Error::WrongKind(format!(
                "'{}' is a directory, use a directory download",
                path
            )));
        }
        let target = walk::download_target(local_path, &path::basename(&path))?;
        let mut writer = std::fs::File::create(&target)
            .with_context(|| format!("failed creating {:?}", &target))?;
        tracing::debug!("retrieving '{}' into {:?}", path, &target);
        self.transport.retrieve(&path, &mut writer)
    }

    fn download_dir(
        &mut self,
        path: &str,
        local_path: &std::path::Path,
        predicate: Option<Predicate>,
        recursive: bool,
    ) -> Result<TransferSummary> {
        walk::download_dir(self, &path::normalize(path), local_path, predicate, recursive)
    }

    fn base_dir(&mut self, path: &str) -> Result<String> {
        let path = path::normalize(path);
        walk::assert_exists(self, &path)?;
        Ok(path::parent(&path))
    }

    fn get_description(&mut self, path: &str) -> Result<FileDescriptor> {
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Ok(FileDescriptor::new(path.as_str()));
        }
        walk::assert_exists(self, &path)?;
        if self.probe_directory(&path)? {
            // MDTM is file-only, so directories carry no update time
            return Ok(FileDescriptor::new(path.as_str()));
        }
        let update_date = self.transport.mdtm(&path)?;
        let size = self.listed_size(&path)?;
        let mut descriptor = FileDescriptor::new(path.as_str());
        descriptor.update_date = Some(update_date);
        descriptor.size = size;
        Ok(descriptor)
    }

    fn close(&mut self) -> Result<()> {
        self.transport.quit()
    }
}

/// An authenticated `suppaftp` stream, plain or TLS-secured. Both variants
/// speak the same protocol once the session is up, which is exactly why the
/// secured factory reuses [`FtpConnector`] unchanged.
pub enum FtpSession {
    Plain(suppaftp::FtpStream),
    Secured(suppaftp::NativeTlsFtpStream),
}

impl FtpSession {
    pub(crate) fn connect_plain(settings: &FtpSettings) -> Result<Self> {
        let address = format!("{}:{}", settings.host, settings.port);
        let mut stream = suppaftp::FtpStream::connect(address.as_str()).map_err(|error| {
            Error::Connector(format!("cannot connect to {}: {}", address, error))
        })?;
        stream.login(&settings.login, &settings.password).map_err(|error| {
            Error::Connector(format!(
                "login of '{}' at {} failed: {}",
                settings.login, address, error
            ))
        })?;
        stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|error| refusal_or_transport(error, "setting the binary transfer type"))?;
        stream.set_mode(if settings.passive {
            suppaftp::Mode::Passive
        } else {
            suppaftp::Mode::Active
        });
        Ok(FtpSession::Plain(stream))
    }
}

fn refusal_or_transport(error: suppaftp::FtpError, what: &str) -> Error {
    match error {
        suppaftp::FtpError::UnexpectedResponse(response) => Error::Connector(format!(
            "server refused {}: {:?}",
            what, response.status
        )),
        error => Error::Other(anyhow::anyhow!(error).context(format!("ftp {} failed", what))),
    }
}

/// Streams a `RETR` data connection into the writer without buffering the
/// file; the byte count feeds the transfer summaries.
fn copy_data_stream(
    reader: &mut dyn std::io::Read,
    writer: &mut dyn std::io::Write,
) -> suppaftp::FtpResult<u64> {
    std::io::copy(reader, writer).map_err(suppaftp::FtpError::ConnectionError)
}

struct CountingReader<'a> {
    inner: &'a mut dyn std::io::Read,
    bytes: u64,
}

impl<'a> CountingReader<'a> {
    fn new(inner: &'a mut dyn std::io::Read) -> Self {
        CountingReader { inner, bytes: 0 }
    }
}

impl std::io::Read for CountingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }
}

impl FtpTransport for FtpSession {
    fn cwd(&mut self, dir_path: &str) -> Result<()> {
        match self {
            FtpSession::Plain(stream) => stream.cwd(dir_path),
            FtpSession::Secured(stream) => stream.cwd(dir_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("CWD '{}'", dir_path)))
    }

    fn mkdir(&mut self, dir_path: &str) -> Result<()> {
        match self {
            FtpSession::Plain(stream) => stream.mkdir(dir_path),
            FtpSession::Secured(stream) => stream.mkdir(dir_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("MKD '{}'", dir_path)))
    }

    fn rmdir(&mut self, dir_path: &str) -> Result<()> {
        match self {
            FtpSession::Plain(stream) => stream.rmdir(dir_path),
            FtpSession::Secured(stream) => stream.rmdir(dir_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("RMD '{}'", dir_path)))
    }

    fn remove_file(&mut self, file_path: &str) -> Result<()> {
        match self {
            FtpSession::Plain(stream) => stream.rm(file_path),
            FtpSession::Secured(stream) => stream.rm(file_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("DELE '{}'", file_path)))
    }

    fn nlst(&mut self, any_path: &str) -> Result<Vec<String>> {
        match self {
            FtpSession::Plain(stream) => stream.nlst(Some(any_path)),
            FtpSession::Secured(stream) => stream.nlst(Some(any_path)),
        }
        .map_err(|error| refusal_or_transport(error, &format!("NLST '{}'", any_path)))
    }

    fn list(&mut self, any_path: &str) -> Result<Vec<String>> {
        match self {
            FtpSession::Plain(stream) => stream.list(Some(any_path)),
            FtpSession::Secured(stream) => stream.list(Some(any_path)),
        }
        .map_err(|error| refusal_or_transport(error, &format!("LIST '{}'", any_path)))
    }

    fn mdtm(&mut self, file_path: &str) -> Result<DateTime<Utc>> {
        let naive = match self {
            FtpSession::Plain(stream) => stream.mdtm(file_path),
            FtpSession::Secured(stream) => stream.mdtm(file_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("MDTM '{}'", file_path)))?;
        Ok(naive.and_utc())
    }

    fn size(&mut self, file_path: &str) -> Result<u64> {
        let size = match self {
            FtpSession::Plain(stream) => stream.size(file_path),
            FtpSession::Secured(stream) => stream.size(file_path),
        }
        .map_err(|error| refusal_or_transport(error, &format!("SIZE '{}'", file_path)))?;
        Ok(size as u64)
    }

    fn retrieve(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64> {
        match self {
            FtpSession::Plain(stream) => {
                stream.retr(file_path, |reader| copy_data_stream(reader, writer))
            }
            FtpSession::Secured(stream) => {
                stream.retr(file_path, |reader| copy_data_stream(reader, writer))
            }
        }
        .map_err(|error| refusal_or_transport(error, &format!("RETR '{}'", file_path)))
    }

    fn store(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64> {
        let mut counting = CountingReader::new(reader);
        let stored = match self {
            FtpSession::Plain(stream) => stream.put_file(file_path, &mut counting),
            FtpSession::Secured(stream) => stream.put_file(file_path, &mut counting),
        };
        if let Err(error) = stored {
            return Err(refusal_or_transport(error, &format!("STOR '{}'", file_path)));
        }
        Ok(counting.bytes)
    }

    fn quit(&mut self) -> Result<()> {
        match self {
            FtpSession::Plain(stream) => stream.quit(),
            FtpSession::Secured(stream) => stream.quit(),
        }
        .map_err(|error| refusal_or_transport(error, "QUIT"))
    }
}

/// Open and authenticate a plain FTP session, returning a [`Client`] bound
/// to `path`.
pub fn ftp_client(settings: &FtpSettings, path: &str) -> Result<Client> {
    tracing::debug!("opening ftp session to {}:{}", settings.host, settings.port);
    let session = FtpSession::connect_plain(settings)?;
    Ok(Client::new(
        path,
        std::rc::Rc::new(std::cell::RefCell::new(FtpConnector::new(session))),
    ))
}
