// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

/// Size of an erasable flash page in bytes.
/// A page must be fully erased before any word inside it is programmed.
pub const FLASH_PAGE_SIZE: usize = 1024;

/// Flash programming granularity in bytes.
/// Buffers that do not end on a word boundary get their last word padded with 0xFF.
pub const FLASH_WORD_SIZE: usize = 4;

/// Flash address of the persistent metadata record (version and firmware size).
/// The record owns the whole page so it can be erased without touching firmware.
pub const METADATA_BASE: u32 = 0xFC00;

/// Flash address where the firmware image starts.
/// The NUL-terminated release message follows the image immediately.
pub const FIRMWARE_BASE: u32 = 0x1_0000;

/// Address the bootloader branches to when booting.
/// The low bit selects Thumb state on Cortex-M.
pub const FIRMWARE_ENTRY_POINT: u32 = FIRMWARE_BASE | 1;

/// Largest firmware image accepted by an update (32KB).
pub const MAX_FIRMWARE_SIZE: usize = 0x8000;

/// Largest release message accepted by an update, terminator included.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Ciphertext staging capacity: firmware plus its trailing release message.
pub const STAGING_SIZE: usize = MAX_FIRMWARE_SIZE + MAX_MESSAGE_SIZE;

/// Largest payload carried by one firmware frame.
pub const MAX_FRAME_SIZE: usize = 256;

/// AES block size. Ciphertext lengths are always a multiple of it.
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-256 key length.
pub const AES_KEY_SIZE: usize = 32;

/// Raw `r || s` ECDSA P-256 signature length.
pub const SIGNATURE_SIZE: usize = 64;

/// Untagged `x || y` P-256 public key length.
pub const PUBLIC_KEY_SIZE: usize = 64;

/// SHA-256 digest length.
pub const DIGEST_SIZE: usize = 32;

/// Version stamped on the image provisioned at first boot.
pub const INITIAL_FIRMWARE_VERSION: u16 = 2;

const _: () = assert!(STAGING_SIZE % FLASH_PAGE_SIZE == 0);
const _: () = assert!(FLASH_PAGE_SIZE % AES_BLOCK_SIZE == 0);
const _: () = assert!(FLASH_PAGE_SIZE % FLASH_WORD_SIZE == 0);
const _: () = assert!(METADATA_BASE as usize % FLASH_PAGE_SIZE == 0);
const _: () = assert!(FIRMWARE_BASE as usize % FLASH_PAGE_SIZE == 0);
