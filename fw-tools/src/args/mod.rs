// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    crate::protect::CipherKey,
    clap::Parser,
    consts::{AES_BLOCK_SIZE, AES_KEY_SIZE, PUBLIC_KEY_SIZE},
    sec1::der::Decode,
    std::path::{Path, PathBuf},
    zeroize::Zeroizing,
};

mod cli;
mod config;

pub use config::{Config, Error as ConfigError};

/// Default serial baud rate of the bootloader UART.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Program arguments loaded from the CLI and config file.
pub struct Invocation {
    pub args: Args,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub enum Args {
    /// Generate key material into a directory.
    Keygen { out_dir: PathBuf },
    /// Encrypt and sign a firmware binary.
    Protect {
        secret: p256::SecretKey,
        cipher: CipherKey,
        input: PathBuf,
        output: PathBuf,
        version: u16,
        message: String,
        debug: bool,
    },
    /// Dump the package metadata to stdout.
    Dump { input: PathBuf },
    /// Send a package to the bootloader.
    Update {
        input: PathBuf,
        port: String,
        baud_rate: u32,
        pubkey: Option<[u8; PUBLIC_KEY_SIZE]>,
        debug: bool,
        boot: bool,
    },
}

pub fn args<I, T>(args: I) -> Result<Invocation, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Args::try_parse_from(args).map_err(Error::Cli)?;
    let args = match cli.command {
        cli::Command::Keygen { out_dir } => Args::Keygen { out_dir },
        cli::Command::Dump { input } => Args::Dump { input },
        cli::Command::Protect {
            config,
            secret,
            aes_key,
            iv,
            input,
            output,
            firmware_version,
            message,
            debug,
        } => {
            let config = load_config(config.as_deref())?;
            let config_secret_path = config
                .secret
                .map(|secret| {
                    if !secret.is_absolute() {
                        return Err(Error::SecretPathNotAbsoluteInConfig(secret));
                    }
                    Ok(secret)
                })
                .transpose()?;

            // Reconcile the CLI and config arguments. Error if anything is specified both
            // on the CLI and in the config file.
            let secret = match (secret, config_secret_path) {
                (None, None) => return Err(Error::SecretMissing),
                (None, Some(secret)) | (Some(secret), None) => secret,
                (Some(_), Some(_)) => return Err(Error::SecretInConfigAndCli),
            };
            let aes_key = match (aes_key, config.aes_key) {
                (None, None) => return Err(Error::AesKeyMissing),
                (None, Some(key)) | (Some(key), None) => key,
                (Some(_), Some(_)) => return Err(Error::AesKeyInConfigAndCli),
            };
            let iv = match (iv, config.iv) {
                (None, None) => return Err(Error::IvMissing),
                (None, Some(iv)) | (Some(iv), None) => iv,
                (Some(_), Some(_)) => return Err(Error::IvInConfigAndCli),
            };

            // Parse the arguments.
            let secret = read_secret(&secret)?;
            let aes_key = Zeroizing::new(
                decode_hex::<AES_KEY_SIZE>(&aes_key).ok_or(Error::InvalidAesKeyHex)?,
            );
            let iv = decode_hex::<AES_BLOCK_SIZE>(&iv).ok_or(Error::InvalidIvHex)?;

            Args::Protect {
                secret,
                cipher: CipherKey { aes_key, iv },
                input,
                output,
                version: firmware_version,
                message,
                debug,
            }
        }
        cli::Command::Update {
            config,
            port,
            baud_rate,
            pubkey,
            input,
            debug,
            boot,
        } => {
            let config = load_config(config.as_deref())?;
            let port = match (port, config.port) {
                (None, None) => return Err(Error::PortMissing),
                (None, Some(port)) | (Some(port), None) => port,
                (Some(_), Some(_)) => return Err(Error::PortInConfigAndCli),
            };
            let baud_rate = match (baud_rate, config.baud_rate) {
                (None, None) => DEFAULT_BAUD_RATE,
                (None, Some(rate)) | (Some(rate), None) => rate,
                (Some(_), Some(_)) => return Err(Error::BaudRateInConfigAndCli),
            };
            let pubkey = match (pubkey, config.pubkey) {
                (None, None) => None,
                (None, Some(pubkey)) | (Some(pubkey), None) => Some(pubkey),
                (Some(_), Some(_)) => return Err(Error::PubkeyInConfigAndCli),
            };
            let pubkey = pubkey
                .map(|p| decode_hex::<PUBLIC_KEY_SIZE>(&p).ok_or(Error::InvalidPubkeyHex))
                .transpose()?;

            Args::Update {
                input,
                port,
                baud_rate,
                pubkey,
                debug,
                boot,
            }
        }
    };
    Ok(Invocation {
        args,
        verbose: cli.verbose,
    })
}

fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    Ok(path.map(Config::load).transpose()?.unwrap_or_default())
}

/// Load a SEC1 `EC PRIVATE KEY` PEM file.
pub fn read_secret(path: &Path) -> Result<p256::SecretKey, Error> {
    let pem = std::fs::read(path).map_err(Error::ReadPemFile)?;
    let key = pem::parse(pem)?;
    if key.tag() != "EC PRIVATE KEY" {
        return Err(Error::InvalidPemTag(key.tag().to_string()));
    }
    let secret = sec1::EcPrivateKey::from_der(key.contents())
        .map_err(Error::ParseDerContent)?
        .private_key;
    p256::SecretKey::from_slice(secret).map_err(Error::InvalidSecretKey)
}

fn decode_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    hex::decode(s.trim()).ok()?.try_into().ok()
}

#[derive(Debug)]
pub enum Error {
    AesKeyInConfigAndCli,
    AesKeyMissing,
    BaudRateInConfigAndCli,
    Cli(clap::Error),
    Config(ConfigError),
    InvalidAesKeyHex,
    InvalidIvHex,
    InvalidPemTag(String),
    InvalidPubkeyHex,
    InvalidSecretKey(p256::elliptic_curve::Error),
    IvInConfigAndCli,
    IvMissing,
    ParseDerContent(sec1::der::Error),
    ParsePemFile(pem::PemError),
    PortInConfigAndCli,
    PortMissing,
    PubkeyInConfigAndCli,
    ReadPemFile(std::io::Error),
    SecretInConfigAndCli,
    SecretMissing,
    SecretPathNotAbsoluteInConfig(PathBuf),
}

impl From<pem::PemError> for Error {
    fn from(e: pem::PemError) -> Self {
        Error::ParsePemFile(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AesKeyInConfigAndCli => write!(f, "AES key specified in both config and cli"),
            Error::AesKeyMissing => write!(f, "user did not specify an AES key"),
            Error::BaudRateInConfigAndCli => {
                write!(f, "baud rate specified in both config and cli")
            }
            Error::Cli(e) => write!(f, "{}", e.render().ansi()),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::InvalidAesKeyHex => {
                write!(f, "AES key must be {AES_KEY_SIZE} bytes of hex")
            }
            Error::InvalidIvHex => write!(f, "IV must be {AES_BLOCK_SIZE} bytes of hex"),
            Error::InvalidPemTag(tag) => {
                write!(f, r#"invalid PEM tag: "{tag}", expected "EC PRIVATE KEY""#)
            }
            Error::InvalidPubkeyHex => write!(
                f,
                "public key must be {PUBLIC_KEY_SIZE} bytes of hex (uncompressed x || y)"
            ),
            Error::InvalidSecretKey(e) => write!(f, "user specified invalid secret key: {e}"),
            Error::IvInConfigAndCli => write!(f, "IV specified in both config and cli"),
            Error::IvMissing => write!(f, "user did not specify an IV"),
            Error::ParseDerContent(e) => {
                write!(f, "failed to parse DER content inside PEM file: {e}")
            }
            Error::ParsePemFile(e) => write!(f, "invalid PEM file: {e}"),
            Error::PortInConfigAndCli => write!(f, "port specified in both config and cli"),
            Error::PortMissing => write!(f, "user did not specify a serial port"),
            Error::PubkeyInConfigAndCli => write!(f, "pubkey specified in both config and cli"),
            Error::ReadPemFile(e) => write!(f, "failed to read PEM file: {e}"),
            Error::SecretInConfigAndCli => write!(f, "secret specified in both config and cli"),
            Error::SecretMissing => write!(f, "user did not specify a secret key"),
            Error::SecretPathNotAbsoluteInConfig(path) => {
                write!(
                    f,
                    r#"config error: secret key path is not absolute: "{}""#,
                    path.to_str().unwrap_or("<invalid path>")
                )
            }
        }
    }
}

impl std::error::Error for Error {}
