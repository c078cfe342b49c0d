// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use cortex_m::peripheral::SCB;
use embedded_io::Write;

use crate::error::ErrorKind;
use crate::platform::Platform;

/// Cortex-M platform: resets on failure and branches into the application.
/// The release message goes out on `diag`, usually the debug UART.
pub struct CortexM<W> {
    diag: W,
}

impl<W: Write> CortexM<W> {
    pub fn new(diag: W) -> Self {
        Self { diag }
    }
}

impl<W: Write> Platform for CortexM<W> {
    fn fail_fast(&mut self, kind: ErrorKind) {
        error!("session failed: {:?}, resetting", kind);
        SCB::sys_reset();
    }

    fn diagnostic(&mut self, text: &[u8]) {
        // Nothing else can report a dead diagnostic port.
        let _ = self.diag.write_all(text);
        let _ = self.diag.write_all(b"\r\n");
        let _ = self.diag.flush();
    }

    fn jump(&mut self, entry_point: u32) {
        info!("jumping to {}", entry_point);
        // SAFETY: the entry point belongs to an image that passed signature
        // verification before it was written.
        unsafe { jump_to_app(entry_point) }
    }
}

/// Branch to `entry_point` with interrupts disabled.
///
/// # Safety
///
/// This runs whatever code is placed at `entry_point`. The address must carry the
/// Thumb bit.
pub unsafe fn jump_to_app(entry_point: u32) -> ! {
    cortex_m::interrupt::disable();

    // These instructions perform the following operations:
    //
    // * Modify control register to use MSP as stack pointer (clear spsel bit)
    // * Synchronize instruction barrier
    // * Jump to the application entry point
    core::arch::asm!(
        "mrs {tmp}, CONTROL",
        "bics {tmp}, {spsel}",
        "msr CONTROL, {tmp}",
        "isb",
        "bx {entry}",
        // `out(reg) _` is not permitted in a `noreturn` asm! call,
        // so instead use `in(reg) 0` and don't restore it afterwards.
        tmp = in(reg) 0,
        spsel = in(reg) 2,
        entry = in(reg) entry_point,
        options(noreturn),
    );
}
