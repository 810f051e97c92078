//! SFTP backend over an ssh2 session.
//!
//! Unlike FTP, the SFTP subsystem answers metadata questions directly: a
//! single `stat` tells existence, kind, size and modification time, so
//! nothing needs to be synthesized from listings. Directory sizes are still
//! reported as zero even though servers stat them with a block size. The
//! [`SftpTransport`] trait isolates the wire library; [`SshSession`] adapts
//! ssh2 onto it.

use anyhow::Context;
use chrono::{DateTime, Utc};
use common::errors::{Error, Result};
use common::localfs::LocalFs;
use common::FileDescriptor;

use crate::walk::{RemoveSummary, TransferSummary};
use crate::{path, walk, Client, Connector, Predicate};

// sftp status codes for a missing path (protocol v3 and the v4+ variant)
const NO_SUCH_FILE: i32 = 2;
const NO_SUCH_PATH: i32 = 10;

/// Session parameters for [`sftp_client`].
#[derive(Clone, Debug)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    /// OpenSSH-format known-hosts file; server keys go unchecked when absent
    pub known_hosts_path: Option<std::path::PathBuf>,
}

/// What a remote `stat` said about a path.
#[derive(Clone, Debug)]
pub struct RemoteStat {
    pub is_dir: bool,
    /// raw size as reported, block sizes for directories included
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub owner: Option<String>,
}

/// The SFTP primitives the connector algorithms need, already authenticated.
/// `stat` of a missing path reports `None` rather than failing; a request
/// the server refuses surfaces as [`Error::Connector`].
pub trait SftpTransport {
    fn stat(&mut self, any_path: &str) -> Result<Option<RemoteStat>>;
    fn readdir(&mut self, dir_path: &str) -> Result<Vec<(String, RemoteStat)>>;
    fn mkdir(&mut self, dir_path: &str) -> Result<()>;
    fn rmdir(&mut self, dir_path: &str) -> Result<()>;
    fn unlink(&mut self, file_path: &str) -> Result<()>;
    fn realpath(&mut self, any_path: &str) -> Result<String>;
    fn download(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64>;
    fn upload(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64>;
    fn disconnect(&mut self) -> Result<()>;
}

/// [`Connector`] over any [`SftpTransport`].
pub struct SftpConnector<T> {
    transport: T,
}

impl<T: SftpTransport> SftpConnector<T> {
    pub fn new(transport: T) -> Self {
        SftpConnector { transport }
    }

    fn stat_required(&mut self, path: &str) -> Result<RemoteStat> {
        self.transport
            .stat(path)?
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }
}

fn describe(path: &str, stat: &RemoteStat) -> FileDescriptor {
    let mut descriptor = FileDescriptor::new(path);
    descriptor.size = if stat.is_dir { 0 } else { stat.size };
    descriptor.update_date = stat.mtime;
    descriptor.owner = stat.owner.clone();
    descriptor
}

impl<T: SftpTransport> Connector for SftpConnector<T> {
    fn exists(&mut self, path: &str) -> Result<bool> {
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Ok(true);
        }
        Ok(self.transport.stat(&path)?.is_some())
    }

    fn is_directory(&mut self, path: &str) -> Result<bool> {
        let path = path::normalize(path);
        Ok(self.stat_required(&path)?.is_dir)
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        let path = path::normalize(path);
        let stat = self.stat_required(&path)?;
        if stat.is_dir {
            return Ok(0);
        }
        Ok(stat.size)
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<String>> {
        let path = path::normalize(path);
        let stat = self.stat_required(&path)?;
        if !stat.is_dir {
            return Ok(vec![path]);
        }
        Ok(self
            .transport
            .readdir(&path)?
            .into_iter()
            .map(|(entry, _)| entry)
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
            self.transport.upload(&path, &mut empty)?;
            Ok(())
        }
    }

    fn delete(&mut self, path: &str, recursive: bool) -> Result<RemoveSummary> {
        let path = path::normalize(path);
        if self.stat_required(&path)?.is_dir {
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
            self.transport.unlink(&path)?;
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
        tracing::debug!("uploading to '{}'", target);
        self.transport.upload(&target, &mut reader)
    }

    fn download_file(&mut self, path: &str, local_path: &std::path::Path) -> Result<u64> {
        let path = path::normalize(path);
        if self.stat_required(&path)?.is_dir {
            return Err(Error::WrongKind(format!(
                "'{}' is a directory, use a directory download",
                path
            )));
        }
        let target = walk::download_target(local_path, &path::basename(&path))?;
        let mut writer = std::fs::File::create(&target)
            .with_context(|| format!("failed creating {:?}", &target))?;
        tracing::debug!("downloading '{}' into {:?}", path, &target);
        self.transport.download(&path, &mut writer)
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
        let resolved = self.transport.realpath(&path)?;
        Ok(path::parent(&path::normalize(&resolved)))
    }

    fn get_description(&mut self, path: &str) -> Result<FileDescriptor> {
        let path = path::normalize(path);
        let stat = self.stat_required(&path)?;
        Ok(describe(&path, &stat))
    }

    fn close(&mut self) -> Result<()> {
        self.transport.disconnect()
    }
}

fn sftp_error(error: ssh2::Error, what: &str) -> Error {
    match error.code() {
        ssh2::ErrorCode::SFTP(_) => {
            Error::Connector(format!("server refused {}: {}", what, error))
        }
        _ => Error::Other(anyhow::anyhow!(error).context(format!("ssh {} failed", what))),
    }
}

fn remote_stat(stat: &ssh2::FileStat) -> RemoteStat {
    RemoteStat {
        is_dir: stat.is_dir(),
        size: stat.size.unwrap_or(0),
        mtime: stat
            .mtime
            .and_then(|seconds| DateTime::from_timestamp(seconds as i64, 0)),
        owner: stat.uid.map(|uid| uid.to_string()),
    }
}

/// An authenticated ssh2 session with its SFTP subsystem open. The session
/// handle stays alive here so the subsystem keeps a transport under it.
pub struct SshSession {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
}

impl SftpTransport for SshSession {
    fn stat(&mut self, any_path: &str) -> Result<Option<RemoteStat>> {
        match self.sftp.stat(std::path::Path::new(any_path)) {
            Ok(stat) => Ok(Some(remote_stat(&stat))),
            Err(error) => match error.code() {
                ssh2::ErrorCode::SFTP(NO_SUCH_FILE) | ssh2::ErrorCode::SFTP(NO_SUCH_PATH) => {
                    Ok(None)
                }
                _ => Err(sftp_error(error, &format!("stat of '{}'", any_path))),
            },
        }
    }

    fn readdir(&mut self, dir_path: &str) -> Result<Vec<(String, RemoteStat)>> {
        let entries = self
            .sftp
            .readdir(std::path::Path::new(dir_path))
            .map_err(|error| sftp_error(error, &format!("listing '{}'", dir_path)))?;
        Ok(entries
            .into_iter()
            .map(|(entry, stat)| (entry.to_string_lossy().into_owned(), remote_stat(&stat)))
            .collect())
    }

    fn mkdir(&mut self, dir_path: &str) -> Result<()> {
        self.sftp
            .mkdir(std::path::Path::new(dir_path), 0o755)
            .map_err(|error| sftp_error(error, &format!("creating '{}'", dir_path)))
    }

    fn rmdir(&mut self, dir_path: &str) -> Result<()> {
        self.sftp
            .rmdir(std::path::Path::new(dir_path))
            .map_err(|error| sftp_error(error, &format!("removing directory '{}'", dir_path)))
    }

    fn unlink(&mut self, file_path: &str) -> Result<()> {
        self.sftp
            .unlink(std::path::Path::new(file_path))
            .map_err(|error| sftp_error(error, &format!("removing file '{}'", file_path)))
    }

    fn realpath(&mut self, any_path: &str) -> Result<String> {
        let resolved = self
            .sftp
            .realpath(std::path::Path::new(any_path))
            .map_err(|error| sftp_error(error, &format!("resolving '{}'", any_path)))?;
        Ok(resolved.to_string_lossy().into_owned())
    }

    fn download(&mut self, file_path: &str, writer: &mut dyn std::io::Write) -> Result<u64> {
        let mut file = self
            .sftp
            .open(std::path::Path::new(file_path))
            .map_err(|error| sftp_error(error, &format!("opening '{}'", file_path)))?;
        let bytes = std::io::copy(&mut file, writer)
            .with_context(|| format!("failed reading '{}'", file_path))?;
        Ok(bytes)
    }

    fn upload(&mut self, file_path: &str, reader: &mut dyn std::io::Read) -> Result<u64> {
        let mut file = self
            .sftp
            .create(std::path::Path::new(file_path))
            .map_err(|error| sftp_error(error, &format!("creating '{}'", file_path)))?;
        let bytes = std::io::copy(reader, &mut file)
            .with_context(|| format!("failed writing '{}'", file_path))?;
        Ok(bytes)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "closing session", None)
            .map_err(|error| sftp_error(error, "disconnect"))
    }
}

fn verify_host_key(
    session: &ssh2::Session,
    host: &str,
    port: u16,
    known_hosts_path: &std::path::Path,
) -> Result<()> {
    let mut known_hosts = session
        .known_hosts()
        .map_err(|error| sftp_error(error, "loading known hosts"))?;
    known_hosts
        .read_file(known_hosts_path, ssh2::KnownHostFileKind::OpenSSH)
        .map_err(|error| sftp_error(error, &format!("reading {:?}", known_hosts_path)))?;
    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| Error::Connector(format!("{} presented no host key", host)))?;
    match known_hosts.check_port(host, port, key) {
        ssh2::CheckResult::Match => Ok(()),
        ssh2::CheckResult::Mismatch => Err(Error::Connector(format!(
            "host key for {} changed, refusing to continue",
            host
        ))),
        ssh2::CheckResult::NotFound => Err(Error::Connector(format!(
            "{} is not present in {:?}",
            host, known_hosts_path
        ))),
        ssh2::CheckResult::Failure => Err(Error::Connector(format!(
            "host key check for {} failed",
            host
        ))),
    }
}

/// Open and authenticate an SFTP session, returning a [`Client`] bound to
/// `path`. The server key is verified against the known-hosts file before
/// credentials are sent, when one is configured.
pub fn sftp_client(settings: &SftpSettings, path: &str) -> Result<Client> {
    tracing::debug!(
        "opening sftp session to {}:{}",
        settings.host,
        settings.port
    );
    let tcp = std::net::TcpStream::connect((settings.host.as_str(), settings.port)).map_err(
        |error| {
            Error::Connector(format!(
                "cannot connect to {}:{}: {}",
                settings.host, settings.port, error
            ))
        },
    )?;
    let mut session =
        ssh2::Session::new().map_err(|error| sftp_error(error, "session setup"))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|error| {
        Error::Connector(format!(
            "ssh handshake with {} failed: {}",
            settings.host, error
        ))
    })?;
    if let Some(known_hosts_path) = &settings.known_hosts_path {
        verify_host_key(&session, &settings.host, settings.port, known_hosts_path)?;
    }
    session
        .userauth_password(&settings.login, &settings.password)
        .map_err(|error| {
            Error::Connector(format!(
                "login of '{}' at {} failed: {}",
                settings.login, settings.host, error
            ))
        })?;
    let sftp = session
        .sftp()
        .map_err(|error| sftp_error(error, "opening the sftp subsystem"))?;
    Ok(Client::new(
        path,
        std::rc::Rc::new(std::cell::RefCell::new(SftpConnector::new(SshSession {
            session,
            sftp,
        }))),
    ))
}
