// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Page programming on top of any `embedded-storage` NOR flash.

use consts::FLASH_PAGE_SIZE;
use embedded_storage::nor_flash::NorFlash;
use host_protocol::round_up;

use crate::error::FlashError;

const READBACK_CHUNK: usize = 64;

/// Owns the flash device and a page-sized scratch buffer.
///
/// Every page goes through erase, program and readback. The last partial word of
/// a page is padded with `0xFF`, the erased value, so it programs as a no-op.
pub struct FlashProgrammer<F> {
    flash: F,
    scratch: [u8; FLASH_PAGE_SIZE],
}

impl<F: NorFlash> FlashProgrammer<F> {
    pub fn new(flash: F) -> Result<Self, FlashError> {
        if F::ERASE_SIZE != FLASH_PAGE_SIZE
            || FLASH_PAGE_SIZE % F::WRITE_SIZE != 0
            || READBACK_CHUNK % F::READ_SIZE != 0
        {
            return Err(FlashError::Geometry);
        }
        Ok(Self {
            flash,
            scratch: [0xFF; FLASH_PAGE_SIZE],
        })
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    pub fn capacity(&self) -> usize {
        self.flash.capacity()
    }

    /// Read any byte range. Ranges the driver cannot read directly go through
    /// a window aligned to `F::READ_SIZE`.
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let align = F::READ_SIZE;
        if address as usize % align == 0 && buf.len() % align == 0 {
            return self
                .flash
                .read(address, buf)
                .map_err(|_| FlashError::Read { address });
        }

        let mut window = [0u8; READBACK_CHUNK];
        let mut done = 0;
        while done < buf.len() {
            let at = address as usize + done;
            let start = at - at % align;
            let skip = at - start;
            let span = round_up(skip + buf.len() - done, align).min(READBACK_CHUNK);
            self.flash
                .read(start as u32, &mut window[..span])
                .map_err(|_| FlashError::Read {
                    address: start as u32,
                })?;
            let take = (span - skip).min(buf.len() - done);
            buf[done..done + take].copy_from_slice(&window[skip..skip + take]);
            done += take;
        }
        Ok(())
    }

    /// Erase the page at `address` and program `data` at its start.
    pub fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if address as usize % FLASH_PAGE_SIZE != 0 || data.len() > FLASH_PAGE_SIZE {
            return Err(FlashError::Misaligned { address });
        }

        self.flash
            .erase(address, address + FLASH_PAGE_SIZE as u32)
            .map_err(|_| FlashError::Erase { address })?;
        trace!("erased page {}", address);

        if data.is_empty() {
            return Ok(());
        }

        let padded = round_up(data.len(), F::WRITE_SIZE);
        self.scratch[..data.len()].copy_from_slice(data);
        self.scratch[data.len()..padded].fill(0xFF);

        self.flash
            .write(address, &self.scratch[..padded])
            .map_err(|_| FlashError::Program { address })?;

        self.verify(address, padded)
    }

    fn verify(&mut self, address: u32, len: usize) -> Result<(), FlashError> {
        let mut readback = [0u8; READBACK_CHUNK];
        let mut offset = 0;
        while offset < len {
            let n = READBACK_CHUNK.min(len - offset);
            let at = address + offset as u32;
            self.read(at, &mut readback[..n])?;
            if readback[..n] != self.scratch[offset..offset + n] {
                error!("readback mismatch in page {}", address);
                return Err(FlashError::VerifyMismatch { address: at });
            }
            offset += n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sim::{SimFlash, WordReadFlash};
    use consts::FIRMWARE_BASE;

    #[test]
    fn pads_last_word_with_erased_bytes() {
        let mut flash = SimFlash::new();
        flash.memory[FIRMWARE_BASE as usize..][..FLASH_PAGE_SIZE].fill(0x00);

        let mut programmer = FlashProgrammer::new(flash).unwrap();
        let data = [0xA5u8; 10];
        programmer.program_page(FIRMWARE_BASE, &data).unwrap();

        let flash = programmer.into_inner();
        let page = &flash.memory[FIRMWARE_BASE as usize..][..FLASH_PAGE_SIZE];
        assert_eq!(page[..10], data);
        assert_eq!(page[10..12], [0xFF, 0xFF]);
        assert!(page[12..].iter().all(|&b| b == 0xFF));
        assert_eq!(flash.writes, [(FIRMWARE_BASE, 12)]);
    }

    #[test]
    fn rejects_unaligned_page() {
        let mut programmer = FlashProgrammer::new(SimFlash::new()).unwrap();
        assert_eq!(
            programmer.program_page(FIRMWARE_BASE + 4, &[0; 4]),
            Err(FlashError::Misaligned {
                address: FIRMWARE_BASE + 4
            })
        );
        assert_eq!(
            programmer.program_page(FIRMWARE_BASE, &[0; FLASH_PAGE_SIZE + 1]),
            Err(FlashError::Misaligned {
                address: FIRMWARE_BASE
            })
        );
    }

    #[test]
    fn readback_mismatch_is_reported() {
        let mut flash = SimFlash::new();
        flash.corrupt_page = Some(FIRMWARE_BASE);
        let mut programmer = FlashProgrammer::new(flash).unwrap();
        assert_eq!(
            programmer.program_page(FIRMWARE_BASE, &[0x10; 32]),
            Err(FlashError::VerifyMismatch {
                address: FIRMWARE_BASE
            })
        );
    }

    #[test]
    fn unaligned_read_on_word_flash() {
        let data: Vec<u8> = (0..200u8).collect();
        let mut programmer = FlashProgrammer::new(WordReadFlash(SimFlash::new())).unwrap();
        programmer.program_page(FIRMWARE_BASE, &data).unwrap();

        let mut buf = [0u8; 70];
        programmer.read(FIRMWARE_BASE + 3, &mut buf).unwrap();
        assert_eq!(buf[..], data[3..73]);

        let mut tail = [0u8; 3];
        programmer.read(FIRMWARE_BASE + 197, &mut tail).unwrap();
        assert_eq!(tail, [197, 198, 199]);
    }
}
