// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command line arguments.

use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
    /// Log debug messages (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Generate a fresh AES key, IV and P-256 signing key.
    Keygen {
        /// Directory receiving secret.pem, public_key.bin and fw-tools.toml.
        #[clap(long)]
        out_dir: PathBuf,
    },
    /// Encrypt and sign a firmware binary into an update package.
    Protect {
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
        /// Path to PEM-encoded P-256 secret key.
        #[clap(long)]
        secret: Option<PathBuf>,
        /// AES-256 key in hex.
        #[clap(long)]
        aes_key: Option<String>,
        /// AES-CBC initialization vector in hex.
        #[clap(long)]
        iv: Option<String>,
        /// The firmware binary.
        #[clap(short, long)]
        input: PathBuf,
        /// Path to write the update package.
        #[clap(short, long)]
        output: PathBuf,
        /// Version to write in the metadata. 0 marks a debug image.
        #[clap(long)]
        firmware_version: u16,
        /// Release message shown by the bootloader before it boots the image.
        #[clap(long, default_value = "")]
        message: String,
        /// Allow firmware version 0.
        #[clap(long)]
        debug: bool,
    },
    /// Print the metadata of an update package.
    Dump {
        /// The update package.
        #[clap(short, long)]
        input: PathBuf,
    },
    /// Send an update package to the bootloader over a serial port.
    Update {
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
        /// Serial port the bootloader listens on.
        #[clap(long)]
        port: Option<String>,
        /// Serial baud rate.
        #[clap(long)]
        baud_rate: Option<u32>,
        /// Public key in hex, checked against the package before sending.
        #[clap(long)]
        pubkey: Option<String>,
        /// The update package.
        #[clap(short, long)]
        input: PathBuf,
        /// Allow sending a version 0 package.
        #[clap(long)]
        debug: bool,
        /// Boot the new firmware once it is installed.
        #[clap(long)]
        boot: bool,
    },
}
