// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::MAX_MESSAGE_SIZE;
use embedded_storage::nor_flash::NorFlash;

use crate::config::FlashLayout;
use crate::error::{Error, FlashError};
use crate::flash::FlashProgrammer;
use crate::metadata::PersistentMetadata;
use crate::platform::Platform;

/// Emit the installed release message and jump to the firmware.
///
/// The image was authenticated when it was written, nothing is re-checked here.
/// The message ends at the first NUL or erased byte, or after
/// [`MAX_MESSAGE_SIZE`] bytes.
pub fn boot<F: NorFlash, P: Platform>(
    programmer: &mut FlashProgrammer<F>,
    platform: &mut P,
    layout: &FlashLayout,
) -> Result<(), Error> {
    let record = PersistentMetadata::load(programmer, layout.metadata_base)?
        .ok_or(FlashError::Unprovisioned)?;

    let address = layout.firmware_base + record.size as u32;
    let available = programmer.capacity().saturating_sub(address as usize);
    let mut message = [0u8; MAX_MESSAGE_SIZE];
    let window = &mut message[..MAX_MESSAGE_SIZE.min(available)];
    programmer.read(address, window)?;

    let len = window
        .iter()
        .position(|&b| b == 0x00 || b == 0xFF)
        .unwrap_or(window.len());
    platform.diagnostic(&window[..len]);

    info!(
        "booting version {} ({} bytes)",
        record.version, record.size
    );
    platform.jump(layout.entry_point);
    Ok(())
}
