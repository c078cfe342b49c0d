// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device configuration fixed at manufacturing: key material and flash layout.

use consts::{
    AES_BLOCK_SIZE, AES_KEY_SIZE, FIRMWARE_BASE, FIRMWARE_ENTRY_POINT, METADATA_BASE,
    PUBLIC_KEY_SIZE,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secrets and the update signing authority, provisioned into the bootloader image.
///
/// The AES key and IV are wiped from memory when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    aes_key: [u8; AES_KEY_SIZE],
    iv: [u8; AES_BLOCK_SIZE],
    /// Uncompressed P-256 point, `x || y` big-endian, without the SEC1 `0x04` tag
    #[zeroize(skip)]
    public_key: [u8; PUBLIC_KEY_SIZE],
}

impl KeyMaterial {
    pub const fn new(
        aes_key: [u8; AES_KEY_SIZE],
        iv: [u8; AES_BLOCK_SIZE],
        public_key: [u8; PUBLIC_KEY_SIZE],
    ) -> Self {
        Self {
            aes_key,
            iv,
            public_key,
        }
    }

    pub fn aes_key(&self) -> &[u8; AES_KEY_SIZE] {
        &self.aes_key
    }

    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }
}

impl core::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("aes_key", &"<redacted>")
            .field("iv", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Where the persistent record and the application live in flash.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLayout {
    /// Page holding the persistent `{version, size}` record
    pub metadata_base: u32,
    /// First page of the application image
    pub firmware_base: u32,
    /// Address handed to the jump, Thumb bit included
    pub entry_point: u32,
}

impl FlashLayout {
    pub const DEFAULT: Self = Self {
        metadata_base: METADATA_BASE,
        firmware_base: FIRMWARE_BASE,
        entry_point: FIRMWARE_ENTRY_POINT,
    };
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}
