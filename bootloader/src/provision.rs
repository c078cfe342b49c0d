// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! First-boot installation of the factory image.

use consts::{FLASH_PAGE_SIZE, INITIAL_FIRMWARE_VERSION, MAX_FIRMWARE_SIZE, MAX_MESSAGE_SIZE};
use embedded_storage::nor_flash::NorFlash;

use crate::config::FlashLayout;
use crate::error::{Error, ValidationError};
use crate::flash::FlashProgrammer;
use crate::metadata::PersistentMetadata;

/// Write `image` followed by the NUL-terminated `message` and record it as
/// version [`INITIAL_FIRMWARE_VERSION`].
///
/// Does nothing and returns `false` when a record already exists. The record is
/// written last so an interrupted provisioning is retried on the next start.
pub fn provision_initial_image<F: NorFlash>(
    programmer: &mut FlashProgrammer<F>,
    layout: &FlashLayout,
    image: &[u8],
    message: &[u8],
) -> Result<bool, Error> {
    if let Some(record) = PersistentMetadata::load(programmer, layout.metadata_base)? {
        debug!("already provisioned with version {}", record.version);
        return Ok(false);
    }

    if image.is_empty() {
        return Err(ValidationError::EmptyFirmware.into());
    }
    if image.len() > MAX_FIRMWARE_SIZE {
        return Err(ValidationError::FirmwareTooLarge { size: image.len() }.into());
    }
    let message_size = message.len() + 1;
    if message_size > MAX_MESSAGE_SIZE {
        return Err(ValidationError::MessageTooLarge { message_size }.into());
    }

    let mut content = image
        .iter()
        .chain(message.iter())
        .chain(core::iter::once(&0u8))
        .copied();
    let total = image.len() + message_size;
    let mut page = [0u8; FLASH_PAGE_SIZE];
    let mut address = layout.firmware_base;
    let mut written = 0;
    while written < total {
        let len = FLASH_PAGE_SIZE.min(total - written);
        page[..len]
            .iter_mut()
            .zip(content.by_ref())
            .for_each(|(dst, src)| *dst = src);
        programmer.program_page(address, &page[..len])?;
        written += len;
        address += FLASH_PAGE_SIZE as u32;
    }

    PersistentMetadata {
        version: INITIAL_FIRMWARE_VERSION,
        size: image.len() as u16,
    }
    .store(programmer, layout.metadata_base)?;

    info!(
        "provisioned initial image: {} bytes, version {}",
        image.len(),
        INITIAL_FIRMWARE_VERSION
    );
    Ok(true)
}
