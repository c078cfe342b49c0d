// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::ErrorKind;

/// Device services the bootloader needs beyond flash and the host channel.
///
/// On hardware `fail_fast` and `jump` never return. Test doubles record the
/// call and return, which lets the session loop observe them.
pub trait Platform {
    /// Abort after a failed session, typically with a device reset.
    fn fail_fast(&mut self, kind: ErrorKind);

    /// Emit the release message of the installed image.
    fn diagnostic(&mut self, text: &[u8]);

    /// Hand control to the installed firmware.
    fn jump(&mut self, entry_point: u32);
}
