use anyhow::{Context, Result};
use clap::Parser;
use tracing::instrument;

use connector::path;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rget",
    version,
    about = "Download remote files and directory trees over FTP, FTPS or SFTP",
    long_about = "`rget` downloads a remote file, or a directory tree, into a local directory.

EXAMPLE:
    # Mirror a directory tree from an FTPS server, skipping logs
    RFS_PASSWORD=... rget --protocol ftps user@files.example.com:/data out \\
        --recursive --exclude '*.log' --summary

A directory download recreates the remote directory under LOCAL (downloading
/data into out/ produces out/data/...). The password is read from the
environment (see --password-env), never from the command line."
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
    /// Descend into subdirectories
    #[arg(short = 'r', long = "recursive", help_heading = "Transfer")]
    recursive: bool,

    // Filtering options
    /// Glob pattern for files to include (can be specified multiple times)
    ///
    /// Only files matching at least one include pattern will be downloaded. Patterns use glob
    /// syntax: * matches anything except /, ** matches anything including /, ? matches single
    /// char, [...] for character classes. Leading / anchors to the remote directory, trailing /
    /// matches only directories. Simple patterns (like *.txt) match entry names; anchored
    /// patterns (like /src/**) match paths inside the remote directory.
    #[arg(long, value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Filtering")]
    include: Vec<String>,

    /// Glob pattern for files to exclude (can be specified multiple times)
    ///
    /// Files matching any exclude pattern will be skipped. Excludes are checked before includes.
    /// A skipped directory is never descended into.
    #[arg(long, value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Filtering")]
    exclude: Vec<String>,

    /// Read filter patterns from file
    #[arg(long, value_name = "PATH", conflicts_with_all = ["include", "exclude"], help_heading = "Filtering")]
    filter_file: Option<std::path::PathBuf>,

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

    /// Local directory to download into (or target path for a single file)
    #[arg(value_name = "LOCAL", default_value = ".")]
    local: std::path::PathBuf,
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
    // build filter settings once before opening the session
    let filter = if let Some(ref path) = args.filter_file {
        Some(common::filter::FilterSettings::from_file(path)?)
    } else if !args.include.is_empty() || !args.exclude.is_empty() {
        let mut filter_settings = common::filter::FilterSettings::new();
        for p in &args.include {
            filter_settings.add_include(p)?;
        }
        for p in &args.exclude {
            filter_settings.add_exclude(p)?;
        }
        Some(filter_settings)
    } else {
        None
    };
    let locator = path::parse_locator(&args.remote)?;
    let client = open_client(&args, &locator)?;
    let summary = if client.is_directory()? {
        let base = client.path().to_string();
        let mut predicate = filter.as_ref().map(|filter_settings| {
            move |entry: &str, conn: &mut dyn connector::Connector| -> common::Result<bool> {
                let relative = path::relative(&base, entry);
                let is_dir = conn.is_directory(entry)?;
                match filter_settings.should_include(&relative, is_dir) {
                    common::filter::FilterResult::Included => Ok(true),
                    common::filter::FilterResult::ExcludedByDefault => Ok(false),
                    common::filter::FilterResult::ExcludedByPattern(pattern) => {
                        tracing::debug!("'{}' excluded by pattern '{}'", entry, pattern);
                        Ok(false)
                    }
                }
            }
        });
        match predicate.as_mut() {
            Some(pred) => client.download_dir(
                &args.local,
                Some(pred as connector::Predicate),
                args.recursive,
            )?,
            None => client.download_dir(&args.local, None, args.recursive)?,
        }
    } else {
        let bytes = client.download_file(&args.local)?;
        connector::TransferSummary {
            bytes_transferred: bytes,
            files_transferred: 1,
            ..Default::default()
        }
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
