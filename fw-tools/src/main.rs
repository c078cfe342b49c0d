// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    colored::Colorize,
    consts::MAX_FRAME_SIZE,
    host_protocol::package::Package,
    std::{ffi::OsString, io::Write, path::Path, time::Duration},
    tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

mod args;
mod keygen;
mod protect;
mod update;

#[cfg(test)]
mod tests;

/// How long the client waits for a single status byte. Covers the
/// verification and flash programming done before the final ack.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> std::process::ExitCode {
    main_args(
        std::env::args_os(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .into()
}

fn main_args<I, T>(args: I, stdout: impl Write, mut stderr: impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match run(args, stdout) {
        Ok(()) => ExitCode(0),
        Err(Error::Args(e @ args::Error::Cli(_))) => {
            // Clap already does the "error: {}" formatting.
            writeln!(stderr, "{e}").expect("write error to stderr");
            ExitCode(1)
        }
        Err(e) => {
            writeln!(stderr, "{} {e}", "error:".bold().red()).expect("write error to stderr");
            ExitCode(1)
        }
    }
}

fn run<I, T>(args: I, mut stdout: impl Write) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let invocation = args::args(args)?;
    init_logging(invocation.verbose);

    match invocation.args {
        args::Args::Keygen { out_dir } => {
            let keys = keygen::KeySet::generate();
            let config = keys.write(&out_dir)?;
            let pubkey = config.pubkey.unwrap_or_default();
            writeln!(
                &mut stdout,
                "{:10} {}",
                "config".bold(),
                out_dir.join(keygen::CONFIG_FILE).display()
            )
            .map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{:10} {}", "pubkey".bold(), &pubkey[..64])
                .map_err(Error::Stdout)?;
            writeln!(&mut stdout, "{} {}", " ".repeat(10), &pubkey[64..])
                .map_err(Error::Stdout)?;
        }
        args::Args::Protect {
            secret,
            cipher,
            input,
            output,
            version,
            message,
            debug,
        } => {
            if version == 0 && !debug {
                return Err(Error::DebugVersionWithoutFlag);
            }
            let firmware = read_file(&input)?;
            let package = protect::protect(&firmware, &message, version, &cipher, &secret)?;

            // Sanity check the package before handing it out.
            let parsed = Package::parse(&package)?;
            protect::verify_package(&parsed, &protect::public_key_bytes(&secret))?;

            std::fs::write(&output, &package).map_err(Error::WriteOutputFile)?;
            let human_size = humansize::format_size(package.len(), humansize::BINARY);
            writeln!(
                &mut stdout,
                "{:10} {} ({human_size})",
                "wrote".bold(),
                output.display()
            )
            .map_err(Error::Stdout)?;
        }
        args::Args::Dump { input } => {
            let data = read_file(&input)?;
            let package = Package::parse(&data)?;
            dump(&package, &mut stdout).map_err(Error::Stdout)?;
        }
        args::Args::Update {
            input,
            port,
            baud_rate,
            pubkey,
            debug,
            boot,
        } => {
            let data = read_file(&input)?;
            let package = Package::parse(&data)?;
            if package.metadata().is_debug() && !debug {
                return Err(Error::DebugVersionWithoutFlag);
            }
            if let Some(pubkey) = pubkey {
                protect::verify_package(&package, &pubkey)?;
            }

            tracing::info!(%port, baud_rate, "opening serial port");
            let port = serialport::new(&port, baud_rate)
                .timeout(REPLY_TIMEOUT)
                .open()
                .map_err(Error::OpenPort)?;
            let mut client = update::Client::new(port);
            client.update(&package, MAX_FRAME_SIZE)?;
            if boot {
                client.boot()?;
            }
            writeln!(
                &mut stdout,
                "{} version {}",
                "installed".bold().green(),
                package.metadata().version
            )
            .map_err(Error::Stdout)?;
        }
    }
    Ok(())
}

fn dump(package: &Package<'_>, mut out: impl Write) -> std::io::Result<()> {
    let metadata = package.metadata();
    let debug = if metadata.is_debug() { " (debug)" } else { "" };
    writeln!(out, "{:10} {}{debug}", "version".bold(), metadata.version)?;
    let human_size = humansize::format_size(metadata.size, humansize::BINARY);
    writeln!(out, "{:10} {human_size} ({})", "size".bold(), metadata.size)?;
    writeln!(out, "{:10} {}", "message".bold(), metadata.message_size)?;
    writeln!(out, "{:10} {}", "payload".bold(), package.payload().len())?;
    writeln!(
        out,
        "{:10} {}",
        "signature".bold(),
        hex::encode(&metadata.signature[..32])
    )?;
    writeln!(
        out,
        "{} {}",
        " ".repeat(10),
        hex::encode(&metadata.signature[32..])
    )
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(Error::ReadInputFile)
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    // A subscriber may already be installed when running under the test harness.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitCode(u8);

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        code.0.into()
    }
}

#[derive(Debug)]
enum Error {
    Args(args::Error),
    DebugVersionWithoutFlag,
    Keygen(keygen::Error),
    OpenPort(serialport::Error),
    Package(host_protocol::Error),
    Protect(protect::Error),
    ReadInputFile(std::io::Error),
    Stdout(std::io::Error),
    Update(update::Error),
    WriteOutputFile(std::io::Error),
}

impl From<args::Error> for Error {
    fn from(e: args::Error) -> Self {
        Error::Args(e)
    }
}

impl From<keygen::Error> for Error {
    fn from(e: keygen::Error) -> Self {
        Error::Keygen(e)
    }
}

impl From<host_protocol::Error> for Error {
    fn from(e: host_protocol::Error) -> Self {
        Error::Package(e)
    }
}

impl From<protect::Error> for Error {
    fn from(e: protect::Error) -> Self {
        Error::Protect(e)
    }
}

impl From<update::Error> for Error {
    fn from(e: update::Error) -> Self {
        Error::Update(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Args(e) => write!(f, "{e}"),
            Error::DebugVersionWithoutFlag => write!(
                f,
                "firmware version 0 marks a debug image, pass --debug to use it"
            ),
            Error::Keygen(e) => write!(f, "{e}"),
            Error::OpenPort(e) => write!(f, "failed to open serial port: {e}"),
            Error::Package(e) => write!(f, "invalid package: {e}"),
            Error::Protect(e) => write!(f, "{e}"),
            Error::ReadInputFile(e) => write!(f, "failed to read input file: {e}"),
            Error::Stdout(e) => write!(f, "failed to write to stdout: {e}"),
            Error::Update(e) => write!(f, "update failed: {e}"),
            Error::WriteOutputFile(e) => write!(f, "failed to write to output file: {e}"),
        }
    }
}

impl std::error::Error for Error {}
