// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use embedded_storage::nor_flash::NorFlash;

use crate::error::FlashError;
use crate::flash::FlashProgrammer;

/// Record of the installed image, kept alone on its own flash page.
///
/// Layout: `[version: u16 LE][size: u16 LE]`. An erased page reads back as
/// all `0xFF` and means nothing has been installed yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistentMetadata {
    pub version: u16,
    pub size: u16,
}

impl PersistentMetadata {
    pub const SIZE: usize = 4;

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..2].copy_from_slice(&self.version.to_le_bytes());
        buf[2..].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// `None` for an erased record.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Option<Self> {
        if bytes == [0xFF; Self::SIZE] {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[0], bytes[1]]),
            size: u16::from_le_bytes([bytes[2], bytes[3]]),
        })
    }

    pub fn load<F: NorFlash>(
        programmer: &mut FlashProgrammer<F>,
        base: u32,
    ) -> Result<Option<Self>, FlashError> {
        let mut bytes = [0u8; Self::SIZE];
        programmer.read(base, &mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Rewrite the record page. Not atomic: a reset between erase and program
    /// leaves the record blank.
    pub fn store<F: NorFlash>(
        self,
        programmer: &mut FlashProgrammer<F>,
        base: u32,
    ) -> Result<(), FlashError> {
        programmer.program_page(base, &self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sim::SimFlash;
    use consts::METADATA_BASE;

    #[test]
    fn blank_record_reads_as_none() {
        let mut programmer = FlashProgrammer::new(SimFlash::new()).unwrap();
        assert_eq!(PersistentMetadata::load(&mut programmer, METADATA_BASE), Ok(None));
    }

    #[test]
    fn store_then_load() {
        let mut programmer = FlashProgrammer::new(SimFlash::new()).unwrap();
        let record = PersistentMetadata {
            version: 0x0102,
            size: 0x0304,
        };
        record.store(&mut programmer, METADATA_BASE).unwrap();
        assert_eq!(
            PersistentMetadata::load(&mut programmer, METADATA_BASE),
            Ok(Some(record))
        );

        let flash = programmer.into_inner();
        assert_eq!(
            flash.memory[METADATA_BASE as usize..][..4],
            [0x02, 0x01, 0x04, 0x03]
        );
    }
}
