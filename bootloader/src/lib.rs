// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure firmware update bootloader.
//!
//! An update is received over a blocking byte channel, authenticated with a P-256
//! signature over SHA-256, decrypted with AES-256-CBC and committed to NOR flash
//! page by page with readback verification. Only then is the persistent
//! `{version, size}` record rewritten and the host told the update succeeded.
//!
//! The crate is hardware independent: the channel is any [`embedded_io`] reader
//! and writer, flash is any [`embedded_storage`] NOR flash, and reset, jump and
//! diagnostic output go through [`Platform`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

mod boot;
mod config;
mod decrypt;
mod error;
mod flash;
mod install;
#[cfg(all(target_arch = "arm", target_os = "none"))]
mod jump_app;
mod metadata;
mod platform;
mod provision;
mod session;
mod validate;
mod verify;

#[cfg(test)]
mod tests;

pub use boot::boot;
pub use config::{FlashLayout, KeyMaterial};
pub use decrypt::PageDecryptor;
pub use error::{CryptoError, Error, ErrorKind, FlashError, ProtocolError, ValidationError};
pub use flash::FlashProgrammer;
pub use install::install_image;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use jump_app::{jump_to_app, CortexM};
pub use metadata::PersistentMetadata;
pub use platform::Platform;
pub use provision::provision_initial_image;
pub use session::{Bootloader, Outcome, State};
pub use validate::validate;
pub use verify::{verify_update, P256Verifier, SignatureVerifier, StreamingHasher, VerificationResult};
