use anyhow::{Context, Result};
use clap::Parser;
use tracing::instrument;

use connector::path;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rdel",
    version,
    about = "Delete remote files and directory trees over FTP, FTPS or SFTP",
    long_about = "`rdel` deletes a remote file, or a whole directory tree with --recursive.

EXAMPLE:
    # Remove a staging tree from an SFTP server
    RFS_PASSWORD=... rdel --protocol sftp user@files.example.com:/staging \\
        --recursive --summary

Note: like `rm -rf`, a recursive delete is a destructive operation. Use with
caution. The password is read from the environment (see --password-env),
never from the command line."
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

    // Removal options
    /// Delete directories together with everything below them
    #[arg(short = 'r', long = "recursive", help_heading = "Removal")]
    recursive: bool,

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
fn tool_main(args: Args) -> Result<connector::RemoveSummary> {
    let locator = path::parse_locator(&args.remote)?;
    let client = open_client(&args, &locator)?;
    let summary = client.delete(args.recursive)?;
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
