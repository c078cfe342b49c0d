// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::FLASH_PAGE_SIZE;
use embedded_storage::nor_flash::NorFlash;

use crate::decrypt::PageDecryptor;
use crate::error::Error;
use crate::flash::FlashProgrammer;

/// Decrypt the staged ciphertext page by page and program each page at `base`.
///
/// Pages are committed in order. The first failure stops the install, pages
/// already written stay in flash and later pages are left untouched.
pub fn install_image<F: NorFlash>(
    programmer: &mut FlashProgrammer<F>,
    decryptor: &PageDecryptor,
    staged: &mut [u8],
    base: u32,
) -> Result<(), Error> {
    for (index, page) in staged.chunks_mut(FLASH_PAGE_SIZE).enumerate() {
        let address = base + (index * FLASH_PAGE_SIZE) as u32;
        decryptor.decrypt_page(page)?;
        programmer.program_page(address, page)?;
        debug!("page {} written at {}", index, address);
    }
    Ok(())
}
