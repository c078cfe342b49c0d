// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::{MAX_FIRMWARE_SIZE, MAX_MESSAGE_SIZE};
use host_protocol::UpdateMetadata;

use crate::error::ValidationError;

/// Policy checks on announced metadata, run before any frame is accepted.
///
/// `installed` is the version of the record in flash, 0 when the record is blank.
/// Checks run in a fixed order so the first violated rule is the one reported.
pub fn validate(metadata: &UpdateMetadata, installed: u16) -> Result<(), ValidationError> {
    if !metadata.is_debug() && metadata.version < installed {
        return Err(ValidationError::Rollback {
            version: metadata.version,
            installed,
        });
    }

    let size = metadata.size as usize;
    if size > MAX_FIRMWARE_SIZE {
        return Err(ValidationError::FirmwareTooLarge { size });
    }

    let message_size = metadata.message_size as usize;
    if message_size > MAX_MESSAGE_SIZE {
        return Err(ValidationError::MessageTooLarge { message_size });
    }

    if size == 0 {
        return Err(ValidationError::EmptyFirmware);
    }

    Ok(())
}
