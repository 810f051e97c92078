use anyhow::{Context, Result};
use clap::Parser;
use tracing::instrument;

use connector::path;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rput",
    version,
    about = "Upload a local file over FTP, FTPS or SFTP",
    long_about = "`rput` uploads one local file to a remote location.

EXAMPLE:
    # Upload a report into a remote directory, overwriting any previous one
    RFS_PASSWORD=... rput report.csv user@files.example.com:/inbox --update

Uploading onto a remote directory stores the file under its local name;
uploading onto an existing remote file requires --update. The password is
read from the environment (see --password-env), never from the command line."
)]
struct Args {
    // Connection options
    /// Protocol to connect with
    #[arg(
        long,
        value_name = "PROTOCOL",
        default_value = "ftp",
        help_heading = "Connection"
    )]
    protocol: Protocol,

    /// Name of the environment variable holding the password
    #[arg(
        long,
        value_name = "VAR",
        default_value = "RFS_PASSWORD",
        help_heading = "Connection"
    )]
    password_env: String,

    /// OpenSSH known-hosts file used to verify the server key (sftp only)
    ///
    /// When not given, the server key is not checked.
    #[arg(long, value_name = "PATH", help_heading = "Connection")]
    known_hosts: Option<std::path::PathBuf>,

    /// Use active-mode data connections (ftp only; default is passive)
    #[arg(long, help_heading = "Connection")]
    active: bool,

    // Transfer options
    /// Overwrite an existing remote file
    #[arg(short = 'u', long = "update", help_heading = "Transfer")]
    update: bool,

    // Output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    quiet: bool,

    // ARGUMENTS
    /// Local file to upload
    #[arg(value_name = "LOCAL")]
    local: std::path::PathBuf,

    /// Remote location as [user@]host[:port]:path
    #[arg(value_name = "REMOTE")]
    remote: String,
}

#[derive(Copy, Clone, Debug, PartialEq, clap::ValueEnum)]
enum Protocol {
    Ftp,
    Ftps,
    Sftp,
}

fn open_client(args: &Args, locator: &path::Locator) -> Result<connector::Client> {
    let password = std::env::var(&args.password_env).with_context(|| {
        format!(
            "password environment variable '{}' is not set",
            &args.password_env
        )
    })?;
    let login = locator
        .user
        .clone()
        .unwrap_or_else(|| "anonymous".to_string());
    let client = match args.protocol {
        Protocol::Ftp => connector::ftp_client(
            &connector::FtpSettings {
                host: locator.host.clone(),
                port: locator.port.unwrap_or(21),
                login,
                password,
                passive: !args.active,
            },
            &locator.path,
        )?,
        Protocol::Ftps => connector::ftps_client(
            &connector::FtpsSettings {
                host: locator.host.clone(),
                port: locator.port.unwrap_or(21),
                login,
                password,
                data_protection: connector::DataProtection::Private,
            },
            &locator.path,
        )?,
        Protocol::Sftp => connector::sftp_client(
            &connector::SftpSettings {
                host: locator.host.clone(),
                port: locator.port.unwrap_or(22),
                login,
                password,
                known_hosts_path: args.known_hosts.clone(),
            },
            &locator.path,
        )?,
    };
    Ok(client)
}

#[instrument]
fn tool_main(args: Args) -> Result<connector::TransferSummary> {
    let locator = path::parse_locator(&args.remote)?;
    let client = open_client(&args, &locator)?;
    let bytes = client.upload(&args.local, args.update)?;
    let summary = connector::TransferSummary {
        bytes_transferred: bytes,
        files_transferred: 1,
        ..Default::default()
    };
    client.close()?;
    Ok(summary)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || tool_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let res = common::run(&output, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
