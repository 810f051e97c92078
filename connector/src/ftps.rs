//! FTPS backend: explicit TLS (AUTH TLS) over the plain FTP machinery.
//!
//! Everything above the session — existence synthesis, the directory probe,
//! listings, transfers — is the plain-FTP [`FtpConnector`](crate::ftp::FtpConnector);
//! only session establishment differs. Clear data channels are refused at
//! setup rather than silently downgrading file transfers to plaintext.

use common::errors::{Error, Result};

use crate::ftp::{FtpConnector, FtpSession};
use crate::Client;

/// Protection level of the data channel (`PROT`). Control is always secured.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataProtection {
    /// `PROT C`: file contents travel in plaintext. Refused at session
    /// setup — a secured control stream TLS-wraps every data connection it
    /// opens, so the lowered level cannot be honored.
    Clear,
    /// `PROT P`: file contents travel over TLS
    Private,
}

/// Session parameters for [`ftps_client`].
#[derive(Clone, Debug)]
pub struct FtpsSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub data_protection: DataProtection,
}

/// Open and authenticate an explicit-TLS FTP session, returning a [`Client`]
/// bound to `path`.
pub fn ftps_client(settings: &FtpsSettings, path: &str) -> Result<Client> {
    if settings.data_protection == DataProtection::Clear {
        return Err(Error::Connector(
            "clear data channels are not supported, transfers would be plaintext".to_string(),
        ));
    }
    tracing::debug!(
        "opening ftps session to {}:{}",
        settings.host,
        settings.port
    );
    let address = format!("{}:{}", settings.host, settings.port);
    let stream = suppaftp::NativeTlsFtpStream::connect(address.as_str()).map_err(|error| {
        Error::Connector(format!("cannot connect to {}: {}", address, error))
    })?;
    let connector = suppaftp::native_tls::TlsConnector::new()
        .map_err(|error| Error::Connector(format!("cannot set up tls: {}", error)))?;
    let mut stream = stream
        .into_secure(
            suppaftp::NativeTlsConnector::from(connector),
            &settings.host,
        )
        .map_err(|error| {
            Error::Connector(format!("tls negotiation with {} failed: {}", address, error))
        })?;
    stream.login(&settings.login, &settings.password).map_err(|error| {
        Error::Connector(format!(
            "login of '{}' at {} failed: {}",
            settings.login, address, error
        ))
    })?;
    stream
        .transfer_type(suppaftp::types::FileType::Binary)
        .map_err(|error| {
            Error::Connector(format!("server refused the binary transfer type: {}", error))
        })?;
    Ok(Client::new(
        path,
        std::rc::Rc::new(std::cell::RefCell::new(FtpConnector::new(
            FtpSession::Secured(stream),
        ))),
    ))
}
